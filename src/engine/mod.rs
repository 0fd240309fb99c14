//! Crawl engine, correlating `get_peers` queries and responses for every active crawl job.
//!
//! The [Engine] is single threaded; everything happens in [Engine::tick], which
//! should be called in a loop, like [crate::Crawler] does in its own thread.

pub mod config;
mod info;
mod jobs;
pub(crate) mod socket;
mod transactions;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::common::{
    GetPeersRequestArguments, GetPeersResponseArguments, Id, Message, MessageType,
    RequestSpecific, RequestTypeSpecific,
};
use crate::CrawlError;

use config::Config;
use socket::KrpcSocket;
use transactions::TransactionTable;

pub use info::Info;
pub use jobs::{CrawlJob, CrawlReport, JobRegistry};
pub use socket::DEFAULT_PORT;

pub const DEFAULT_BOOTSTRAP_NODES: [&str; 3] = [
    "router.bittorrent.com:6881",
    "router.utorrent.com:6881",
    "dht.transmissionbt.com:6881",
];

/// Default time a crawl job runs before reporting.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
/// Default number of times bootstrap nodes are queried per job.
///
/// Packets get lost and routers are sometimes down, resending a few times
/// makes it likely that at least one query makes it into the network.
pub const DEFAULT_BOOTSTRAP_ROUNDS: usize = 6;
pub const DEFAULT_BOOTSTRAP_INTERVAL: Duration = Duration::from_millis(1);
/// Default interval to replace our node Id, so we are harder to block.
pub const DEFAULT_ID_ROTATION_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_QUERIES_PER_JOB: usize = 4096;

const TRANSACTIONS_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Engine {
    id: Id,
    id_rotated_at: Instant,

    socket: KrpcSocket,

    transactions: TransactionTable,
    last_transactions_cleanup: Instant,
    jobs: JobRegistry,
    /// Queries to newly discovered peers and nodes, sent on the next tick.
    follow_ups: Vec<(Id, SocketAddr)>,

    // Options
    bootstrap: Box<[SocketAddr]>,
    bootstrap_rounds: usize,
    bootstrap_interval: Duration,
    id_rotation_interval: Option<Duration>,
    max_queries_per_job: usize,
}

impl Engine {
    /// Binds the UDP socket, returns an error if that fails.
    pub fn new(config: Config) -> Result<Self, std::io::Error> {
        let socket = KrpcSocket::new(&config)?;

        let address = socket.local_addr();
        info!(?address, "Mainline crawler listening");

        Ok(Engine {
            id: Id::random(),
            id_rotated_at: Instant::now(),

            socket,

            transactions: TransactionTable::new(config.transaction_timeout),
            last_transactions_cleanup: Instant::now(),
            jobs: JobRegistry::new(config.ttl),
            follow_ups: Vec::new(),

            bootstrap: to_socket_address(&config.bootstrap).into(),
            bootstrap_rounds: config.bootstrap_rounds,
            bootstrap_interval: config.bootstrap_interval,
            id_rotation_interval: config.id_rotation_interval,
            max_queries_per_job: config.max_queries_per_job,
        })
    }

    // === Getters ===

    /// Returns this node's current Id.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Returns the address the server is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Resolved bootstrap nodes.
    pub fn bootstrap(&self) -> &[SocketAddr] {
        &self.bootstrap
    }

    /// Returns the active job for this info hash if any.
    pub fn job(&self, info_hash: &Id) -> Option<&CrawlJob> {
        self.jobs.get(info_hash)
    }

    pub fn is_active(&self, info_hash: &Id) -> bool {
        self.jobs.contains(info_hash)
    }

    /// Returns a summary of this node's state.
    pub fn info(&self) -> Info {
        Info::from(self)
    }

    // === Public Methods ===

    /// Start a crawl job for `info_hash`.
    ///
    /// The job reports its results from [Self::tick] once the ttl elapses.
    pub fn crawl(&mut self, info_hash: Id) -> Result<(), CrawlError> {
        self.jobs.start(info_hash)?;

        info!(context = "crawl_job", %info_hash, "Crawling");

        Ok(())
    }

    /// Advance all crawl jobs by one step, and return the reports of the jobs that
    /// ended during this tick.
    pub fn tick(&mut self) -> Vec<CrawlReport> {
        self.maybe_rotate_id();

        if self.last_transactions_cleanup.elapsed() >= TRANSACTIONS_CLEANUP_INTERVAL {
            self.transactions.cleanup();
            self.last_transactions_cleanup = Instant::now();
        }

        self.tick_bootstrap();
        self.send_follow_ups();

        let reports = self.jobs.expire();

        for report in &reports {
            info!(
                context = "crawl_job",
                info_hash = %report.info_hash(),
                peers = report.peers().len(),
                nodes = report.nodes().len(),
                "Done crawling"
            );
        }

        if let Some((bytes, from)) = self.socket.recv_from() {
            self.handle_datagram(&bytes, from);
        }

        reports
    }

    /// Send a `get_peers` query to `address` on behalf of the job for `info_hash`.
    ///
    /// Fire and forget, queries to port 0 or beyond the job's query budget are dropped.
    pub fn get_peers(&mut self, info_hash: Id, address: SocketAddr) {
        if address.port() == 0 {
            trace!(context = "dispatch", ?address, "Dropping query to port 0");
            return;
        }

        if address.is_ipv4() != self.local_addr().is_ipv4() {
            trace!(context = "dispatch", ?address, "Dropping query to other ip family");
            return;
        }

        if let Some(job) = self.jobs.get_mut(&info_hash) {
            if job.queries_sent >= self.max_queries_per_job {
                trace!(context = "dispatch", %info_hash, "Query budget exhausted");
                return;
            }

            job.queries_sent += 1;
        }

        let transaction_id = self.transactions.next_transaction_id();
        self.transactions.register(transaction_id, info_hash);

        let message = Message {
            transaction_id,
            version: None,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: self.id,
                request_type: RequestTypeSpecific::GetPeers(GetPeersRequestArguments {
                    info_hash,
                }),
            }),
        };

        self.socket.send(address, &message);
    }

    /// Handle an incoming datagram, recording any peers and nodes in the response
    /// for the job that sent the corresponding query.
    ///
    /// Anything that is not a well formed response to one of our transactions is ignored.
    pub fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let message = match Message::from_bytes(bytes) {
            Ok(message) => message,
            Err(error) => {
                trace!(context = "reply_validation", ?error, ?from, "Dropping invalid message");
                return;
            }
        };

        let info_hash = match self.transactions.resolve(message.transaction_id) {
            Some(info_hash) => info_hash,
            None => {
                trace!(
                    context = "reply_validation",
                    transaction_id = message.transaction_id,
                    ?from,
                    "Unknown transaction"
                );
                return;
            }
        };

        match message.message_type {
            MessageType::Response(arguments) => self.handle_response(info_hash, &arguments),
            MessageType::Error(error) => {
                debug!(context = "reply_validation", ?error, ?from, "Krpc error response");
            }
            MessageType::Request(_) => {
                trace!(context = "reply_validation", ?from, "Ignoring request");
            }
        }
    }

    // === Private Methods ===

    fn handle_response(&mut self, info_hash: Id, arguments: &GetPeersResponseArguments) {
        // Peers answer DHT queries too, so they get a follow-up query as well.
        for peer in arguments.peers() {
            match peer {
                Ok(peer) => {
                    if self.jobs.record_peer(&info_hash, peer) {
                        debug!(context = "crawl_job", %info_hash, %peer, "Found new peer");
                        self.follow_ups.push((info_hash, peer));
                    }
                }
                Err(error) => trace!(context = "reply_validation", ?error, "Invalid peer"),
            }
        }

        for node in arguments.nodes() {
            match node {
                Ok(node) => {
                    if self.jobs.record_node(&info_hash, node.address) {
                        debug!(context = "crawl_job", %info_hash, node = %node.address, "Found new node");
                        self.follow_ups.push((info_hash, node.address));
                    }
                }
                Err(error) => trace!(context = "reply_validation", ?error, "Invalid node"),
            }
        }
    }

    fn tick_bootstrap(&mut self) {
        let rounds = self.bootstrap_rounds;
        let interval = self.bootstrap_interval;

        let due = self
            .jobs
            .iter_mut()
            .filter(|job| job.should_bootstrap(rounds, interval))
            .map(|job| {
                job.bootstrap_rounds += 1;
                job.last_bootstrap_at = Some(Instant::now());

                *job.info_hash()
            })
            .collect::<Vec<_>>();

        if due.is_empty() {
            return;
        }

        let bootstrap = self.bootstrap.clone();

        for info_hash in due {
            for address in bootstrap.iter() {
                self.get_peers(info_hash, *address);
            }
        }
    }

    fn send_follow_ups(&mut self) {
        for (info_hash, address) in std::mem::take(&mut self.follow_ups) {
            // The job expired since discovering this address.
            if !self.jobs.contains(&info_hash) {
                continue;
            }

            self.get_peers(info_hash, address);
        }
    }

    fn maybe_rotate_id(&mut self) {
        if let Some(interval) = self.id_rotation_interval {
            if self.id_rotated_at.elapsed() >= interval {
                self.id = Id::random();
                self.id_rotated_at = Instant::now();

                trace!(context = "id_rotation", id = ?self.id, "Rotated node Id");
            }
        }
    }
}

/// Resolve `host:port` strings, skipping invalid ports and unresolvable hosts.
fn to_socket_address<T: AsRef<str>>(bootstrap: &[T]) -> Vec<SocketAddr> {
    bootstrap
        .iter()
        .filter_map(|s| {
            let s = s.as_ref();

            let port = s
                .rsplit_once(':')
                .and_then(|(_, port)| port.parse::<u16>().ok())
                .filter(|port| *port > 0);

            if port.is_none() {
                debug!(context = "bootstrap", address = s, "Invalid bootstrap port");
                return None;
            }

            match s.to_socket_addrs() {
                Ok(addresses) => Some(addresses),
                Err(error) => {
                    debug!(context = "bootstrap", address = s, ?error, "Could not resolve bootstrap node");
                    None
                }
            }
        })
        .flat_map(|addresses| addresses.filter(SocketAddr::is_ipv4))
        .collect()
}

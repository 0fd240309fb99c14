//! Crawl jobs registry and their results.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::common::Id;
use crate::CrawlError;

/// The final result of a crawl job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    info_hash: Id,
    peers: Vec<SocketAddr>,
    nodes: Vec<SocketAddr>,
}

impl CrawlReport {
    pub fn info_hash(&self) -> &Id {
        &self.info_hash
    }

    /// Distinct peers found for the info hash, in no particular order.
    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }

    /// Distinct nodes that were found while crawling, in no particular order.
    pub fn nodes(&self) -> &[SocketAddr] {
        &self.nodes
    }
}

impl Display for CrawlReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} peers, {} nodes",
            self.info_hash,
            self.peers.len(),
            self.nodes.len()
        )
    }
}

#[derive(Debug)]
pub struct CrawlJob {
    info_hash: Id,
    peers: HashSet<SocketAddr>,
    nodes: HashSet<SocketAddr>,
    started_at: Instant,

    /// Bootstrap rounds sent so far.
    pub(crate) bootstrap_rounds: usize,
    pub(crate) last_bootstrap_at: Option<Instant>,
    /// Queries sent on behalf of this job.
    pub(crate) queries_sent: usize,
}

impl CrawlJob {
    fn new(info_hash: Id) -> Self {
        Self {
            info_hash,
            peers: HashSet::new(),
            nodes: HashSet::new(),
            started_at: Instant::now(),
            bootstrap_rounds: 0,
            last_bootstrap_at: None,
            queries_sent: 0,
        }
    }

    pub fn info_hash(&self) -> &Id {
        &self.info_hash
    }

    pub fn peers(&self) -> &HashSet<SocketAddr> {
        &self.peers
    }

    pub fn nodes(&self) -> &HashSet<SocketAddr> {
        &self.nodes
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns true if a bootstrap round should be sent now.
    pub(crate) fn should_bootstrap(&self, rounds: usize, interval: Duration) -> bool {
        if self.bootstrap_rounds >= rounds {
            return false;
        }

        match self.last_bootstrap_at {
            Some(last) => last.elapsed() >= interval,
            None => true,
        }
    }

    fn into_report(self) -> CrawlReport {
        CrawlReport {
            info_hash: self.info_hash,
            peers: self.peers.into_iter().collect(),
            nodes: self.nodes.into_iter().collect(),
        }
    }
}

/// Info hash => active crawl job.
#[derive(Debug)]
pub struct JobRegistry {
    ttl: Duration,
    jobs: HashMap<Id, CrawlJob>,
}

impl JobRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            jobs: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, info_hash: &Id) -> Option<&CrawlJob> {
        self.jobs.get(info_hash)
    }

    pub(crate) fn get_mut(&mut self, info_hash: &Id) -> Option<&mut CrawlJob> {
        self.jobs.get_mut(info_hash)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut CrawlJob> {
        self.jobs.values_mut()
    }

    pub fn contains(&self, info_hash: &Id) -> bool {
        self.jobs.contains_key(info_hash)
    }

    /// Start a new job, unless one is already active for this info hash.
    pub fn start(&mut self, info_hash: Id) -> Result<(), CrawlError> {
        if self.jobs.contains_key(&info_hash) {
            return Err(CrawlError::AlreadyInProgress(info_hash));
        }

        self.jobs.insert(info_hash, CrawlJob::new(info_hash));

        Ok(())
    }

    /// Returns `true` if the peer is new to an active job.
    pub fn record_peer(&mut self, info_hash: &Id, peer: SocketAddr) -> bool {
        match self.jobs.get_mut(info_hash) {
            Some(job) => job.peers.insert(peer),
            None => false,
        }
    }

    /// Returns `true` if the node is new to an active job.
    pub fn record_node(&mut self, info_hash: &Id, node: SocketAddr) -> bool {
        match self.jobs.get_mut(info_hash) {
            Some(job) => job.nodes.insert(node),
            None => false,
        }
    }

    /// Remove the job and return what it found.
    pub fn snapshot_and_delete(&mut self, info_hash: &Id) -> Option<CrawlReport> {
        self.jobs.remove(info_hash).map(CrawlJob::into_report)
    }

    /// Remove and report every job that outlived the ttl.
    pub fn expire(&mut self) -> Vec<CrawlReport> {
        let ttl = self.ttl;

        let expired = self
            .jobs
            .values()
            .filter(|job| job.started_at.elapsed() >= ttl)
            .map(|job| job.info_hash)
            .collect::<Vec<_>>();

        expired
            .iter()
            .filter_map(|info_hash| self.snapshot_and_delete(info_hash))
            .collect()
    }
}

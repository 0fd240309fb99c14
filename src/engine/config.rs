use std::time::Duration;

use super::{
    DEFAULT_BOOTSTRAP_INTERVAL, DEFAULT_BOOTSTRAP_NODES, DEFAULT_BOOTSTRAP_ROUNDS,
    DEFAULT_ID_ROTATION_INTERVAL, DEFAULT_MAX_QUERIES_PER_JOB, DEFAULT_TTL,
};
use crate::engine::socket::DEFAULT_PORT;

/// Environment variable overriding the default UDP port.
pub const PORT_ENV_VAR: &str = "UDP_PORT";

#[derive(Debug, Clone)]
/// Crawler Configurations
pub struct Config {
    /// Bootstrap nodes, every crawl job starts by querying these.
    ///
    /// Defaults to [DEFAULT_BOOTSTRAP_NODES]
    pub bootstrap: Vec<String>,
    /// Explicit port to listen on.
    ///
    /// Defaults to None, where [PORT_ENV_VAR] is used if set, and [DEFAULT_PORT] otherwise.
    pub port: Option<u16>,
    /// How long a crawl job runs before reporting its results.
    ///
    /// Defaults to [DEFAULT_TTL]
    pub ttl: Duration,
    /// How many times the bootstrap nodes are queried at the start of a job.
    ///
    /// Defaults to [DEFAULT_BOOTSTRAP_ROUNDS]
    pub bootstrap_rounds: usize,
    /// Interval between bootstrap rounds.
    ///
    /// Defaults to [DEFAULT_BOOTSTRAP_INTERVAL]
    pub bootstrap_interval: Duration,
    /// How often this node's Id is replaced with a random one.
    ///
    /// Defaults to [DEFAULT_ID_ROTATION_INTERVAL], `None` keeps the same Id forever.
    pub id_rotation_interval: Option<Duration>,
    /// Upper bound of `get_peers` queries sent on behalf of a single job.
    ///
    /// Defaults to [DEFAULT_MAX_QUERIES_PER_JOB]
    pub max_queries_per_job: usize,
    /// Age after which an unanswered transaction is forgotten.
    ///
    /// Defaults to [DEFAULT_TTL]
    pub transaction_timeout: Duration,
}

impl Config {
    /// The port to bind to, see [Config::port].
    pub fn resolved_port(&self) -> u16 {
        resolve_port(self.port, std::env::var(PORT_ENV_VAR).ok().as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap: DEFAULT_BOOTSTRAP_NODES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            port: None,
            ttl: DEFAULT_TTL,
            bootstrap_rounds: DEFAULT_BOOTSTRAP_ROUNDS,
            bootstrap_interval: DEFAULT_BOOTSTRAP_INTERVAL,
            id_rotation_interval: Some(DEFAULT_ID_ROTATION_INTERVAL),
            max_queries_per_job: DEFAULT_MAX_QUERIES_PER_JOB,
            transaction_timeout: DEFAULT_TTL,
        }
    }
}

/// Explicit port first, then a parsable `env` value, then [DEFAULT_PORT].
fn resolve_port(explicit: Option<u16>, env: Option<&str>) -> u16 {
    explicit
        .or_else(|| env.and_then(|port| port.trim().parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}

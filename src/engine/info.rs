use std::net::SocketAddr;

use crate::Id;

use super::Engine;

/// Information about this crawler node.
#[derive(Debug, Clone)]
pub struct Info {
    id: Id,
    local_addr: SocketAddr,
    active_jobs: usize,
    inflight_transactions: usize,
}

impl Info {
    /// This node's current [Id], it changes every
    /// [crate::Config::id_rotation_interval].
    pub fn id(&self) -> &Id {
        &self.id
    }
    /// Local UDP socket address that this node is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
    /// Number of crawl jobs that haven't reported yet.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs
    }
    /// Number of transactions that can still be correlated with a job.
    pub fn inflight_transactions(&self) -> usize {
        self.inflight_transactions
    }
}

impl From<&Engine> for Info {
    fn from(engine: &Engine) -> Self {
        Self {
            id: *engine.id(),
            local_addr: engine.local_addr(),
            active_jobs: engine.jobs.len(),
            inflight_transactions: engine.transactions.len(),
        }
    }
}

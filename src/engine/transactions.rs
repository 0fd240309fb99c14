//! Correlate transaction ids of outgoing queries with the crawl job that sent them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::common::Id;

/// Attempts at finding a transaction id that is not currently outstanding.
const MAX_TID_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
struct Transaction {
    info_hash: Id,
    sent_at: Instant,
}

/// Transaction id => info hash of the job that sent the query.
///
/// Entries are never removed on a reply, since a job has no way to tell if it
/// will receive more than one, instead they are evicted after `timeout`.
#[derive(Debug)]
pub struct TransactionTable {
    timeout: Duration,
    transactions: HashMap<u16, Transaction>,
}

impl TransactionTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            transactions: HashMap::new(),
        }
    }

    /// Number of transactions that are not evicted yet.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Pick a random transaction id, preferring ones that are not outstanding.
    ///
    /// Once the id space is saturated, an outstanding id is reused and its
    /// replies may be credited to the newer job.
    pub fn next_transaction_id(&self) -> u16 {
        let mut rng = rand::thread_rng();
        let mut tid: u16 = rng.gen();

        for _ in 1..MAX_TID_ATTEMPTS {
            if !self.transactions.contains_key(&tid) {
                break;
            }
            tid = rng.gen();
        }

        tid
    }

    /// Record that `tid` was sent on behalf of `info_hash`, overwriting any prior entry.
    pub fn register(&mut self, tid: u16, info_hash: Id) {
        self.transactions.insert(
            tid,
            Transaction {
                info_hash,
                sent_at: Instant::now(),
            },
        );
    }

    /// Returns the info hash of the job that sent `tid`, if it is not evicted.
    pub fn resolve(&self, tid: u16) -> Option<Id> {
        self.transactions
            .get(&tid)
            .filter(|transaction| transaction.sent_at.elapsed() < self.timeout)
            .map(|transaction| transaction.info_hash)
    }

    /// Evict transactions older than the timeout.
    pub fn cleanup(&mut self) {
        let timeout = self.timeout;

        self.transactions
            .retain(|_, transaction| transaction.sent_at.elapsed() < timeout);
    }
}

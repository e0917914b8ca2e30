//! Tracks which transactions are currently live and when each one started.
//!
//! A thin `RwLock<HashMap<..>>` — a transaction enters on its first
//! `get_page` and leaves on `complete`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::txn::{StartTime, TxnId};

#[derive(Default)]
pub struct TxnRegistry {
    live: RwLock<HashMap<TxnId, StartTime>>,
}

impl TxnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tid` with `start` if it is not already live, returning
    /// the start time on record (the existing one, if any — registration
    /// is idempotent).
    pub fn register(&self, tid: TxnId, start: StartTime) -> StartTime {
        let mut live = self.live.write().unwrap();
        *live.entry(tid).or_insert(start)
    }

    pub fn lookup(&self, tid: TxnId) -> Option<StartTime> {
        self.live.read().unwrap().get(&tid).copied()
    }

    pub fn forget(&self, tid: TxnId) {
        self.live.write().unwrap().remove(&tid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn register_is_idempotent_on_start_time() {
        let registry = TxnRegistry::new();
        let tid = TxnId::new();
        let first = Instant::now();

        let recorded = registry.register(tid, first);
        assert_eq!(recorded, first);

        let later = Instant::now();
        let recorded_again = registry.register(tid, later);
        assert_eq!(recorded_again, first);
    }

    #[test]
    fn forget_removes_liveness() {
        let registry = TxnRegistry::new();
        let tid = TxnId::new();
        registry.register(tid, Instant::now());
        assert!(registry.lookup(tid).is_some());

        registry.forget(tid);
        assert!(registry.lookup(tid).is_none());
    }
}

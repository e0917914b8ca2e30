//! Blocking lock acquisition with a timeout standing in for real deadlock
//! detection.
//!
//! A loop calls into the lock table, sleeps a fixed interval on denial, and
//! gives up once a deadline (measured from `Instant::now()` at the first
//! attempt) has passed. The deadline is two-tiered: short for a brand-new
//! transaction, longer once it has already acquired something — a
//! transaction that has done no work yet is cheap to restart, while one
//! with locks already in hand is worth giving more rope.

use std::thread::sleep;
use std::time::Instant;

use log::debug;

use crate::config::PoolConfig;
use crate::error::{DbError, DbResult};
use crate::lock_table::{GrantResult, Lock, LockTable};
use crate::page::PageId;
use crate::txn::TxnId;
use crate::txn_registry::TxnRegistry;

/// Drives `LockTable::try_grant` to completion or to a timeout.
pub struct Acquirer<'a> {
    lock_table: &'a LockTable,
    registry: &'a TxnRegistry,
    config: &'a PoolConfig,
}

impl<'a> Acquirer<'a> {
    pub fn new(lock_table: &'a LockTable, registry: &'a TxnRegistry, config: &'a PoolConfig) -> Self {
        Self {
            lock_table,
            registry,
            config,
        }
    }

    /// Blocks until `tid` holds `lock` on `pid`, or until the deadline for
    /// `tid` elapses, in which case `DbError::TxnAborted` is returned.
    ///
    /// The caller — not this function — is responsible for invoking
    /// `BufferPool::complete(tid, false)` after a timeout; `Acquirer` never
    /// touches the lock table except to request the lock itself.
    pub fn acquire(&self, tid: TxnId, pid: PageId, lock: Lock) -> DbResult<()> {
        let now = Instant::now();
        let is_new = self.registry.lookup(tid).is_none();
        let start = self.registry.register(tid, now);

        let (deadline, retry_interval) = if is_new {
            (start + self.config.first_deadline, self.config.initial_sleep)
        } else {
            (start + self.config.running_deadline, self.config.running_sleep)
        };

        loop {
            if self.lock_table.try_grant(pid, tid, lock) == GrantResult::Granted {
                return Ok(());
            }

            if Instant::now() > deadline {
                debug!("{} timed out waiting for {:?} on {:?}", tid, lock, pid);
                return Err(DbError::TxnAborted(tid));
            }

            sleep(retry_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn fast_config() -> PoolConfig {
        PoolConfig {
            first_deadline: Duration::from_millis(80),
            running_deadline: Duration::from_millis(120),
            initial_sleep: Duration::from_millis(5),
            running_sleep: Duration::from_millis(2),
            ..PoolConfig::default()
        }
    }

    #[test]
    fn grants_immediately_when_uncontended() {
        let lock_table = LockTable::new();
        let registry = TxnRegistry::new();
        let config = fast_config();
        let acquirer = Acquirer::new(&lock_table, &registry, &config);

        let tid = TxnId::new();
        let pid = PageId::new(0, 0);
        assert!(acquirer.acquire(tid, pid, Lock::Exclusive).is_ok());
        assert!(lock_table.holds(tid, pid));
    }

    #[test]
    fn times_out_when_blocked_by_another_writer() {
        let lock_table = Arc::new(LockTable::new());
        let registry = Arc::new(TxnRegistry::new());
        let config = Arc::new(fast_config());

        let pid = PageId::new(0, 0);
        let holder = TxnId::new();
        lock_table.try_grant(pid, holder, Lock::Exclusive);

        let (lt, reg, cfg) = (lock_table.clone(), registry.clone(), config.clone());
        let waiter = TxnId::new();
        let result = thread::spawn(move || {
            let acquirer = Acquirer::new(&lt, &reg, &cfg);
            acquirer.acquire(waiter, pid, Lock::Shared)
        })
        .join()
        .unwrap();

        match result {
            Err(DbError::TxnAborted(t)) => assert_eq!(t, waiter),
            other => panic!("expected TxnAborted, got {:?}", other.map(|_| ())),
        }
        // the original holder is unaffected by the waiter's timeout
        assert!(lock_table.holds(holder, pid));
    }
}

//! Per-page shared/exclusive lock table.
//!
//! A single mutex guards flat index maps rather than per-entry locks, so
//! every grant/release is one atomic step. Readers and the writer are kept
//! in separate ownership sets (`held_shared`/`held_exclusive`) so release
//! can tell which kind of lock it is dropping without consulting the page
//! maps. There is no wait-for graph: true deadlock detection is out of
//! scope here, so the `Acquirer` handles contention with a timeout
//! instead.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use log::debug;

use crate::page::{PageId, Permission};
use crate::txn::TxnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    Shared,
    Exclusive,
}

impl From<Permission> for Lock {
    fn from(perm: Permission) -> Self {
        match perm {
            Permission::ReadOnly => Lock::Shared,
            Permission::ReadWrite => Lock::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantResult {
    Granted,
    Denied,
}

#[derive(Default)]
struct LockTableState {
    readers: HashMap<PageId, HashSet<TxnId>>,
    writer: HashMap<PageId, TxnId>,
    held_shared: HashMap<TxnId, HashSet<PageId>>,
    held_exclusive: HashMap<TxnId, HashSet<PageId>>,
}

/// Two-phase, page-granularity shared/exclusive lock table.
///
/// Every operation takes the single internal mutex for its whole duration,
/// so the four maps are never observed in a partially-updated state by a
/// concurrent caller.
pub struct LockTable {
    state: Mutex<LockTableState>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockTableState::default()),
        }
    }

    /// Attempts to grant `lock` on `pid` to `tid`. Idempotent: calling this
    /// again for a lock `tid` already holds returns `Granted` without
    /// changing any state.
    pub fn try_grant(&self, pid: PageId, tid: TxnId, lock: Lock) -> GrantResult {
        let mut state = self.state.lock().unwrap();

        match lock {
            Lock::Shared => {
                if let Some(writer) = state.writer.get(&pid) {
                    if *writer != tid {
                        return GrantResult::Denied;
                    }
                }

                state.readers.entry(pid).or_default().insert(tid);
                state.held_shared.entry(tid).or_default().insert(pid);
            }
            Lock::Exclusive => {
                let readers_ok = match state.readers.get(&pid) {
                    None => true,
                    Some(readers) => readers.is_empty() || (readers.len() == 1 && readers.contains(&tid)),
                };
                if !readers_ok {
                    return GrantResult::Denied;
                }
                if let Some(writer) = state.writer.get(&pid) {
                    if *writer != tid {
                        return GrantResult::Denied;
                    }
                }

                state.writer.insert(pid, tid);
                state.held_exclusive.entry(tid).or_default().insert(pid);
            }
        }

        debug!("granted {:?} on {:?} to {}", lock, pid, tid);
        GrantResult::Granted
    }

    /// True iff `tid` currently holds a shared or exclusive lock on `pid`.
    pub fn holds(&self, tid: TxnId, pid: PageId) -> bool {
        let state = self.state.lock().unwrap();
        state.readers.get(&pid).is_some_and(|r| r.contains(&tid)) || state.writer.get(&pid) == Some(&tid)
    }

    /// Releases whatever lock(s) `tid` holds on `pid`. Documented by the
    /// façade as dangerous: releasing a single page mid-transaction breaks
    /// two-phase locking.
    pub fn release(&self, tid: TxnId, pid: PageId) {
        let mut state = self.state.lock().unwrap();
        Self::release_locked(&mut state, tid, pid);
    }

    fn release_locked(state: &mut LockTableState, tid: TxnId, pid: PageId) {
        if let Some(readers) = state.readers.get_mut(&pid) {
            readers.remove(&tid);
            if readers.is_empty() {
                state.readers.remove(&pid);
            }
        }
        if let Some(held) = state.held_shared.get_mut(&tid) {
            held.remove(&pid);
        }

        if state.writer.get(&pid) == Some(&tid) {
            state.writer.remove(&pid);
        }
        if let Some(held) = state.held_exclusive.get_mut(&tid) {
            held.remove(&pid);
        }
    }

    /// Releases every lock `tid` holds, on every page. Called exactly once
    /// per transaction, by `BufferPool::complete`.
    pub fn release_all(&self, tid: TxnId) {
        let mut state = self.state.lock().unwrap();

        let exclusive = state.held_exclusive.remove(&tid).unwrap_or_default();
        for pid in &exclusive {
            if state.writer.get(pid) == Some(&tid) {
                state.writer.remove(pid);
            }
        }

        let shared = state.held_shared.remove(&tid).unwrap_or_default();
        for pid in &shared {
            if let Some(readers) = state.readers.get_mut(pid) {
                readers.remove(&tid);
                if readers.is_empty() {
                    state.readers.remove(pid);
                }
            }
        }

        debug!("released all locks for {}", tid);
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: usize) -> PageId {
        PageId::new(0, n)
    }

    #[test]
    fn shared_locks_from_distinct_transactions_coexist() {
        let table = LockTable::new();
        let t1 = TxnId::new();
        let t2 = TxnId::new();

        assert_eq!(table.try_grant(pid(0), t1, Lock::Shared), GrantResult::Granted);
        assert_eq!(table.try_grant(pid(0), t2, Lock::Shared), GrantResult::Granted);
        assert!(table.holds(t1, pid(0)));
        assert!(table.holds(t2, pid(0)));
    }

    #[test]
    fn exclusive_lock_excludes_other_readers_and_writers() {
        let table = LockTable::new();
        let t1 = TxnId::new();
        let t2 = TxnId::new();

        assert_eq!(table.try_grant(pid(0), t1, Lock::Exclusive), GrantResult::Granted);
        assert_eq!(table.try_grant(pid(0), t2, Lock::Shared), GrantResult::Denied);
        assert_eq!(table.try_grant(pid(0), t2, Lock::Exclusive), GrantResult::Denied);
    }

    #[test]
    fn same_transaction_can_self_upgrade_without_releasing_shared() {
        let table = LockTable::new();
        let t1 = TxnId::new();

        assert_eq!(table.try_grant(pid(0), t1, Lock::Shared), GrantResult::Granted);
        assert_eq!(table.try_grant(pid(0), t1, Lock::Exclusive), GrantResult::Granted);
        assert!(table.holds(t1, pid(0)));
    }

    #[test]
    fn release_all_drops_every_held_page() {
        let table = LockTable::new();
        let t1 = TxnId::new();
        let t2 = TxnId::new();

        table.try_grant(pid(0), t1, Lock::Exclusive);
        table.try_grant(pid(1), t1, Lock::Shared);
        table.release_all(t1);

        assert!(!table.holds(t1, pid(0)));
        assert!(!table.holds(t1, pid(1)));
        // a later transaction can now take the exclusive lock on pid(0)
        assert_eq!(table.try_grant(pid(0), t2, Lock::Exclusive), GrantResult::Granted);
    }

    #[test]
    fn release_single_page_leaves_others_untouched() {
        let table = LockTable::new();
        let t1 = TxnId::new();

        table.try_grant(pid(0), t1, Lock::Shared);
        table.try_grant(pid(1), t1, Lock::Shared);
        table.release(t1, pid(0));

        assert!(!table.holds(t1, pid(0)));
        assert!(table.holds(t1, pid(1)));
    }
}

//! Crate-wide error type.
//!
//! One error type crosses every public API, but each failure mode gets its
//! own variant so callers can match on it instead of inspecting a message.

use std::fmt;
use std::io;

use crate::page::PageId;
use crate::txn::TxnId;

/// Result alias used throughout the crate.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Lock acquisition exceeded the transaction's deadline (see
    /// [`crate::acquirer::Acquirer`]). The caller must still invoke
    /// `BufferPool::complete(tid, false)` to release whatever that
    /// transaction held before the timeout.
    TxnAborted(TxnId),

    /// The requested page is not owned by any table known to the `Catalog`.
    NotFound(PageId),

    /// Every resident page is dirty, so no clean victim exists to evict.
    /// Enforces NO STEAL: the caller should retry once some other
    /// transaction commits or aborts.
    NoEvictableVictim,

    /// The underlying `PageStore` failed to read or write a page.
    Io(io::Error),

    /// An internal bookkeeping invariant was violated (e.g. a page present
    /// in `resident` but missing from `recency`). This indicates a bug in
    /// the buffer pool itself, not a misuse by the caller.
    InvariantViolation(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::TxnAborted(tid) => write!(f, "transaction {:?} aborted: lock acquisition timed out", tid),
            DbError::NotFound(pid) => write!(f, "page {:?} is not owned by any known table", pid),
            DbError::NoEvictableVictim => write!(f, "all resident pages are dirty, nothing to evict"),
            DbError::Io(e) => write!(f, "page store i/o error: {}", e),
            DbError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DbError {
    fn from(e: io::Error) -> Self {
        DbError::Io(e)
    }
}

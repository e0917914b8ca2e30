//! Transaction identity.
//!
//! The buffer pool only needs an opaque, cheaply comparable handle for
//! "who is asking" — commit/abort coordination, catalog lookups and the
//! rest of a real transaction object live above this crate. `TxnId` is
//! minted from a monotonically increasing counter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, unique transaction handle. Equality and hashing are by identity
/// (the wrapped counter value), never by any derived property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(u64);

impl TxnId {
    /// Mints a fresh, never-before-seen transaction id.
    pub fn new() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TxnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}

/// The instant a transaction first called `get_page`, used by the
/// [`crate::acquirer::Acquirer`] to compute deadlines.
pub type StartTime = Instant;

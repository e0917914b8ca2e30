//! Tunables for a [`crate::buffer_pool::BufferPool`] instance: cache
//! capacity and the lock-acquisition timing constants, gathered into a
//! small value type instead of module-level constants so each pool can be
//! configured independently.

use std::time::Duration;

/// Number of resident pages a [`crate::buffer_pool::BufferPool`] will hold
/// before it must evict.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub capacity: usize,
    pub first_deadline: Duration,
    pub running_deadline: Duration,
    pub initial_sleep: Duration,
    pub running_sleep: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            first_deadline: Duration::from_millis(250),
            running_deadline: Duration::from_millis(500),
            initial_sleep: Duration::from_millis(200),
            running_sleep: Duration::from_millis(10),
        }
    }
}

impl PoolConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

//! Bounded map of resident pages plus the recency bookkeeping the
//! [`crate::evictor::Evictor`] needs to approximate LRU.
//!
//! A single `HashMap<PageId, Page>` plus a parallel recency map: one page
//! shape, so one map, mutated directly by the façade under its structural
//! mutex rather than through per-entry locks.

use std::collections::HashMap;

use log::debug;

use crate::page::{Page, PageId};
use crate::txn::TxnId;

/// Resident pages and their recency counters. Not `Sync` on its own; the
/// façade wraps it behind a single structural mutex.
#[derive(Default)]
pub struct PageCache {
    resident: HashMap<PageId, Page>,
    recency: HashMap<PageId, u64>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    pub fn contains(&self, pid: PageId) -> bool {
        self.resident.contains_key(&pid)
    }

    /// Looks up `pid`. On a hit, every resident page ages by one and `pid`
    /// itself resets to the most recent.
    pub fn get(&mut self, pid: PageId) -> Option<&Page> {
        if !self.resident.contains_key(&pid) {
            return None;
        }
        self.touch(pid);
        self.resident.get(&pid)
    }

    pub fn get_mut(&mut self, pid: PageId) -> Option<&mut Page> {
        if !self.resident.contains_key(&pid) {
            return None;
        }
        self.touch(pid);
        self.resident.get_mut(&pid)
    }

    /// Peeks at a page without disturbing recency. Used by the façade when
    /// walking all resident pages at commit/abort, where touching every
    /// page would make the recency counters meaningless.
    pub fn peek(&self, pid: PageId) -> Option<&Page> {
        self.resident.get(&pid)
    }

    pub fn peek_mut(&mut self, pid: PageId) -> Option<&mut Page> {
        self.resident.get_mut(&pid)
    }

    /// Inserts `page` under `pid`. The caller must have already made room
    /// (via the `Evictor`) if the cache is at capacity — this never evicts
    /// on its own.
    pub fn install(&mut self, pid: PageId, page: Page) {
        self.resident.insert(pid, page);
        self.touch(pid);
        debug!("installed page {:?}, resident count: {}", pid, self.resident.len());
    }

    pub fn mark_dirty(&mut self, pid: PageId, tid: TxnId) {
        if let Some(page) = self.resident.get_mut(&pid) {
            page.mark_dirty(true, Some(tid));
        }
    }

    /// Removes `pid` unconditionally, regardless of dirty state. Used by
    /// rollback and explicit discard; never by ordinary eviction.
    pub fn discard(&mut self, pid: PageId) {
        self.resident.remove(&pid);
        self.recency.remove(&pid);
    }

    pub fn ids(&self) -> Vec<PageId> {
        self.resident.keys().copied().collect()
    }

    pub fn recency_of(&self, pid: PageId) -> Option<u64> {
        self.recency.get(&pid).copied()
    }

    /// Ages every resident page by one, then resets `pid` to zero (most
    /// recent). Exposed so the `Evictor` and the façade's post-install step
    /// can share the exact aging rule `get`/`install` use.
    ///
    /// Ages with a wrapping add; a counter that would wrap triggers a
    /// rescale pass that subtracts the current minimum from every counter
    /// first, so relative recency order survives instead of collapsing
    /// every page to the same age.
    pub fn touch(&mut self, pid: PageId) {
        if self.recency.values().any(|age| *age == u64::MAX) {
            self.rescale();
        }
        for (&other, age) in self.recency.iter_mut() {
            if other != pid {
                *age = age.wrapping_add(1);
            }
        }
        self.recency.insert(pid, 0);
    }

    /// Subtracts the minimum recency value from every counter, preserving
    /// relative order while pulling every value away from `u64::MAX`.
    fn rescale(&mut self) {
        let Some(&min) = self.recency.values().min() else {
            return;
        };
        for age in self.recency.values_mut() {
            *age -= min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(pid: PageId) -> Page {
        Page::new(pid, vec![0u8; crate::page::PAGE_SIZE])
    }

    #[test]
    fn install_then_get_ages_other_pages() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);

        cache.install(a, page(a));
        cache.install(b, page(b));

        assert_eq!(cache.recency_of(a), Some(1));
        assert_eq!(cache.recency_of(b), Some(0));

        cache.get(a);
        assert_eq!(cache.recency_of(a), Some(0));
        assert_eq!(cache.recency_of(b), Some(1));
    }

    #[test]
    fn touch_rescales_instead_of_collapsing_order_on_overflow() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        cache.install(a, page(a));
        cache.install(b, page(b));

        // force a imminent-overflow state directly rather than looping
        // u64::MAX times.
        *cache.recency.get_mut(&a).unwrap() = u64::MAX;
        *cache.recency.get_mut(&b).unwrap() = 5;

        cache.touch(b);

        // the rescale subtracts the pre-touch minimum (5) from every
        // counter before aging: a drops to u64::MAX - 5, ages by one more,
        // b (the touched page) resets to zero. Order between a and b is
        // preserved, and nothing wrapped around to look more recent than b.
        assert_eq!(cache.recency_of(a), Some(u64::MAX - 5 + 1));
        assert_eq!(cache.recency_of(b), Some(0));
    }

    #[test]
    fn discard_removes_from_both_maps() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        cache.install(a, page(a));
        cache.discard(a);

        assert!(!cache.contains(a));
        assert_eq!(cache.recency_of(a), None);
    }

    #[test]
    fn peek_does_not_disturb_recency() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        cache.install(a, page(a));
        cache.install(b, page(b));

        let before = cache.recency_of(a);
        cache.peek(a);
        assert_eq!(cache.recency_of(a), before);
    }
}

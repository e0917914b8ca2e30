//! Victim selection for the buffer pool's bounded cache.
//!
//! Implements NO STEAL: a dirty page is never written out just to make
//! room. This module is what actually enforces that when picking a
//! victim, not just when flushing on request.

use log::debug;

use crate::error::{DbError, DbResult};
use crate::page::PageId;
use crate::page_cache::PageCache;

pub struct Evictor;

impl Evictor {
    /// Evicts one clean, least-recently-used page from `cache`.
    ///
    /// `flush` is invoked on the chosen victim before it is dropped from
    /// the cache; since the victim is always clean by construction this is
    /// a no-op in practice, but keeping the call means a future policy
    /// change (e.g. flushing instead of forbidding dirty eviction) has a
    /// single place to plug into.
    pub fn evict_one(cache: &mut PageCache, flush: impl FnOnce(PageId) -> DbResult<()>) -> DbResult<PageId> {
        let victim = Self::select_victim(cache).ok_or(DbError::NoEvictableVictim)?;

        flush(victim)?;
        cache.discard(victim);
        debug!("evicted page {:?}", victim);
        Ok(victim)
    }

    /// Finds the clean resident page with the largest recency counter
    /// (least recently used), or `None` if every resident page is dirty.
    fn select_victim(cache: &PageCache) -> Option<PageId> {
        let mut best: Option<(PageId, u64)> = None;
        for pid in cache.ids() {
            let page = cache.peek(pid).expect("id came from the cache's own key set");
            if page.is_dirty().is_some() {
                continue;
            }
            let age = cache.recency_of(pid).unwrap_or(0);
            match best {
                Some((_, best_age)) if best_age >= age => {}
                _ => best = Some((pid, age)),
            }
        }
        best.map(|(pid, _)| pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::txn::TxnId;

    fn page(pid: PageId) -> Page {
        Page::new(pid, vec![0u8; crate::page::PAGE_SIZE])
    }

    #[test]
    fn evicts_largest_recency_among_clean_pages() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        let c = PageId::new(0, 2);
        let d = PageId::new(0, 3);

        cache.install(a, page(a));
        cache.install(b, page(b));
        cache.install(c, page(c));
        // installing d does not touch a/b/c further; a has the highest age
        let victim = Evictor::evict_one(&mut cache, |_| Ok(())).unwrap();
        assert_eq!(victim, a);
        cache.install(d, page(d));
        assert!(!cache.contains(a));
    }

    #[test]
    fn refuses_to_evict_when_everything_is_dirty() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        cache.install(a, page(a));
        cache.install(b, page(b));
        cache.mark_dirty(a, TxnId::new());
        cache.mark_dirty(b, TxnId::new());

        let result = Evictor::evict_one(&mut cache, |_| Ok(()));
        assert!(matches!(result, Err(DbError::NoEvictableVictim)));
    }

    #[test]
    fn skips_dirty_pages_even_if_least_recently_used() {
        let mut cache = PageCache::new();
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        cache.install(a, page(a));
        cache.install(b, page(b));
        cache.mark_dirty(a, TxnId::new());

        let victim = Evictor::evict_one(&mut cache, |_| Ok(())).unwrap();
        assert_eq!(victim, b);
    }
}

//! The public façade: the only entry point most callers ever touch.
//!
//! Ties the lock table, page cache and eviction policy together behind a
//! small set of operations (`get_page`, `insert`, `delete`, `complete`).
//! `BufferPool` is an explicit value constructed with `BufferPool::new`
//! and handed an `Arc<dyn PageStore>` / `Arc<dyn Catalog>` rather than
//! reached through ambient global state — see the Open Question note in
//! `DESIGN.md`.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::acquirer::Acquirer;
use crate::config::PoolConfig;
use crate::error::{DbError, DbResult};
use crate::evictor::Evictor;
use crate::external::{Catalog, PageStore, TableFile, Tuple};
use crate::lock_table::{Lock, LockTable};
use crate::page::{Page, PageId, Permission, TableId};
use crate::page_cache::PageCache;
use crate::txn::TxnId;
use crate::txn_registry::TxnRegistry;

pub struct BufferPool {
    config: PoolConfig,
    store: Arc<dyn PageStore>,
    catalog: Arc<dyn Catalog>,
    lock_table: LockTable,
    registry: TxnRegistry,
    /// Structural mutex: held only while mutating the cache's own
    /// bookkeeping (install/evict/discard/flush/touch), never while the
    /// caller might be reading or writing page bytes under its own page
    /// lock.
    cache: Mutex<PageCache>,
}

impl BufferPool {
    pub fn new(config: PoolConfig, store: Arc<dyn PageStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            config,
            store,
            catalog,
            lock_table: LockTable::new(),
            registry: TxnRegistry::new(),
            cache: Mutex::new(PageCache::new()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Fetches `pid` on behalf of `tid`, acquiring the lock implied by
    /// `perm` first. On a cache miss the page is read through the
    /// `PageStore`, evicting a clean victim first if the cache is full.
    ///
    /// The `PageStore` read happens with the structural mutex released
    /// (only the single write inside `flush_page` may happen
    /// while that mutex is held). Another thread may race us and install
    /// the same page first; if so we discard our own read and serve the
    /// winner's copy instead of installing twice.
    pub fn get_page(&self, tid: TxnId, pid: PageId, perm: Permission) -> DbResult<Page> {
        let acquirer = Acquirer::new(&self.lock_table, &self.registry, &self.config);
        acquirer.acquire(tid, pid, Lock::from(perm))?;

        if let Some(page) = self.cache.lock().unwrap().get(pid) {
            return Ok(page.clone());
        }

        if !self.catalog.tables().contains(&pid.table_id) {
            return Err(DbError::NotFound(pid));
        }

        let fetched = self.store.read_page(pid)?;

        let mut cache = self.cache.lock().unwrap();
        if let Some(page) = cache.get(pid) {
            debug!("lost the race to install {:?}, serving the winner's copy", pid);
            return Ok(page.clone());
        }

        if cache.len() >= self.config.capacity {
            Evictor::evict_one(&mut cache, |_| Ok(()))?;
        }
        cache.install(pid, fetched.clone());
        debug!("fetched {:?} from store on cache miss", pid);
        Ok(fetched)
    }

    /// Resolves `table_id` via the catalog, delegates the insert to its
    /// `TableFile`, then re-installs and dirties every page the insert
    /// touched. Must not be called while the caller holds the structural
    /// mutex (it isn't exposed, so this is automatically satisfied).
    pub fn insert(&self, tid: TxnId, table_id: TableId, tuple: &Tuple) -> DbResult<()> {
        let table = self
            .catalog
            .db_file(table_id)
            .ok_or(DbError::NotFound(PageId::new(table_id, 0)))?;

        let touched = table.insert(tid, tuple)?;

        let mut cache = self.cache.lock().unwrap();
        for page in touched {
            Self::install_touched(&mut cache, tid, page);
        }
        Ok(())
    }

    /// Resolves the table from `tuple.table_id`, delegates the delete to
    /// its `TableFile`, and dirties the single page it returns. No
    /// re-install is needed: unlike insert, delete never creates a page
    /// the cache hasn't already seen.
    pub fn delete(&self, tid: TxnId, tuple: &Tuple) -> DbResult<()> {
        let table = self
            .catalog
            .db_file(tuple.table_id)
            .ok_or(DbError::NotFound(PageId::new(tuple.table_id, 0)))?;

        let page = table.delete(tid, tuple)?;

        let mut cache = self.cache.lock().unwrap();
        Self::install_touched(&mut cache, tid, page);
        Ok(())
    }

    /// Installs a page handed back by a `TableFile`, preserving the
    /// before-image of whatever was already resident under the same id:
    /// `TableFile::insert`/`delete` read straight from the `PageStore`, so
    /// the `Page` they return has its before-image set to its own
    /// (already-mutated) bytes, which is only correct for a page that
    /// wasn't resident yet.
    fn install_touched(cache: &mut PageCache, tid: TxnId, mut page: Page) {
        let pid = page.id();
        if let Some(resident) = cache.peek(pid) {
            page.inherit_before_image(resident);
        }
        cache.install(pid, page);
        cache.mark_dirty(pid, tid);
    }

    /// Commits or aborts `tid`: flushes-and-snapshots on commit,
    /// restores-from-before-image on abort, then releases every lock `tid`
    /// held, in that order.
    pub fn complete(&self, tid: TxnId, commit: bool) -> DbResult<()> {
        self.registry.forget(tid);

        let mut cache = self.cache.lock().unwrap();
        if commit {
            self.commit_locked(&mut cache, tid)?;
        } else {
            self.abort_locked(&mut cache, tid);
        }
        drop(cache);

        self.lock_table.release_all(tid);
        debug!("{} completed, commit={}", tid, commit);
        Ok(())
    }

    fn commit_locked(&self, cache: &mut PageCache, tid: TxnId) -> DbResult<()> {
        let ids = cache.ids();

        for pid in &ids {
            let dirty_owner = cache.peek(*pid).and_then(|p| p.is_dirty());
            if dirty_owner == Some(tid) {
                Self::flush_one(&self.store, cache, *pid)?;
            }
        }

        // Clean pages (including ones just flushed above) get a fresh
        // before-image so a later abort by a different transaction rolls
        // back to this commit's bytes, not to whatever predates it.
        for pid in &ids {
            if let Some(page) = cache.peek_mut(*pid) {
                if page.is_dirty().is_none() {
                    page.set_before_image();
                }
            }
        }

        Ok(())
    }

    fn abort_locked(&self, cache: &mut PageCache, tid: TxnId) {
        for pid in cache.ids() {
            let dirty_owner = cache.peek(pid).and_then(|p| p.is_dirty());
            if dirty_owner == Some(tid) {
                if let Some(page) = cache.peek_mut(pid) {
                    let before = page.before_image();
                    *page = before;
                }
            }
        }
    }

    /// Documented as dangerous: releasing a single lock mid-transaction
    /// breaks two-phase locking. Exists for callers (e.g. lock-coupled
    /// B+-tree descents) that know what they are doing.
    pub fn release(&self, tid: TxnId, pid: PageId) {
        self.lock_table.release(tid, pid);
    }

    /// Writes the resident copy of `pid` through the `PageStore` and marks
    /// it clean. No-op if `pid` is not resident.
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let mut cache = self.cache.lock().unwrap();
        Self::flush_one(&self.store, &mut cache, pid)
    }

    fn flush_one(store: &Arc<dyn PageStore>, cache: &mut PageCache, pid: PageId) -> DbResult<()> {
        let Some(page) = cache.peek(pid) else {
            return Ok(());
        };
        store.write_page(page)?;
        if let Some(page) = cache.peek_mut(pid) {
            page.mark_dirty(false, None);
        }
        Ok(())
    }

    pub fn flush_all_pages(&self) -> DbResult<()> {
        let mut cache = self.cache.lock().unwrap();
        for pid in cache.ids() {
            Self::flush_one(&self.store, &mut cache, pid)?;
        }
        Ok(())
    }

    /// Removes `pid` from the cache without flushing it. Used by recovery
    /// paths that need to guarantee a stale or rolled-back page is never
    /// served from memory again.
    pub fn discard_page(&self, pid: PageId) {
        let mut cache = self.cache.lock().unwrap();
        cache.discard(pid);
    }

    pub fn holds(&self, tid: TxnId, pid: PageId) -> bool {
        self.lock_table.holds(tid, pid)
    }

    /// Whether `pid` is currently resident, regardless of which (if any)
    /// transaction holds its lock. Exposed mainly for tests asserting the
    /// eviction policy's choice of victim.
    pub fn is_resident(&self, pid: PageId) -> bool {
        self.cache.lock().unwrap().contains(pid)
    }

    /// Number of resident pages. Exposed mainly for tests asserting the
    /// capacity bound.
    pub fn resident_count(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testkit::{self, InMemoryStore};

    const TABLE: TableId = 7;

    fn pool_with_capacity(capacity: usize) -> (Arc<BufferPool>, Arc<InMemoryStore>) {
        let (pool, store, _table) = testkit::setup(PoolConfig::with_capacity(capacity), TABLE);
        (pool, store)
    }

    #[test]
    fn get_page_on_unknown_table_is_not_found() {
        let (pool, _store) = pool_with_capacity(4);
        let tid = TxnId::new();
        let result = pool.get_page(tid, PageId::new(TABLE + 1, 0), Permission::ReadOnly);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn get_page_caches_across_calls() {
        let (pool, _store) = pool_with_capacity(4);
        let tid = TxnId::new();
        let pid = PageId::new(TABLE, 0);

        pool.get_page(tid, pid, Permission::ReadOnly).unwrap();
        assert_eq!(pool.resident_count(), 1);
        pool.get_page(tid, pid, Permission::ReadOnly).unwrap();
        assert_eq!(pool.resident_count(), 1);
    }

    #[test]
    fn insert_then_commit_flushes_to_the_store() {
        let (pool, store) = pool_with_capacity(4);
        let tid = TxnId::new();
        let tuple = Tuple::new(TABLE, b"payload".to_vec());

        pool.insert(tid, TABLE, &tuple).unwrap();
        let pid = PageId::new(TABLE, 0);
        assert!(store.durable_bytes(pid).is_none());

        pool.complete(tid, true).unwrap();
        assert!(store.durable_bytes(pid).is_some());
        assert!(!pool.holds(tid, pid));
    }

    #[test]
    fn complete_releases_every_lock_the_transaction_held() {
        let (pool, _store) = pool_with_capacity(4);
        let tid = TxnId::new();
        let a = PageId::new(TABLE, 0);
        let b = PageId::new(TABLE, 1);

        pool.get_page(tid, a, Permission::ReadWrite).unwrap();
        pool.get_page(tid, b, Permission::ReadOnly).unwrap();
        pool.complete(tid, true).unwrap();

        assert!(!pool.holds(tid, a));
        assert!(!pool.holds(tid, b));
    }
}

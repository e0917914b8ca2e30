//! Minimal in-memory stand-ins for `PageStore`, `Catalog` and `TableFile`,
//! used only by this crate's own tests.
//!
//! The real file layout, catalog and tuple algorithms live outside this
//! crate. This module exists purely so `BufferPool` can be exercised end
//! to end without a real storage engine underneath it — a tiny fixture
//! builder alongside the test suite, not production code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::buffer_pool::BufferPool;
use crate::config::PoolConfig;
use crate::error::{DbError, DbResult};
use crate::external::{Catalog, PageStore, TableFile, Tuple};
use crate::page::{Page, PageId, Permission, TableId, PAGE_SIZE};
use crate::txn::TxnId;

/// A record is stored as `[flag: u8][length: u32 LE][payload]`. `flag == 0`
/// marks the end of used space in the page (the rest is zero-filled);
/// `flag == 1` is a live record; `flag == 2` is a tombstoned one. The
/// length is always preserved, even once tombstoned, so a scan can still
/// skip over it to find whatever comes next.
const FLAG_END: u8 = 0;
const FLAG_LIVE: u8 = 1;
const FLAG_TOMBSTONE: u8 = 2;
const RECORD_HEADER: usize = 5;

/// An in-memory "disk": every write is durable for the lifetime of the
/// `InMemoryStore`, nothing more.
#[derive(Default)]
pub struct InMemoryStore {
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only escape hatch: read the durable bytes directly, bypassing
    /// the buffer pool entirely. Used to assert that a commit actually
    /// reached "disk".
    pub fn durable_bytes(&self, pid: PageId) -> Option<Vec<u8>> {
        self.pages.lock().unwrap().get(&pid).cloned()
    }
}

impl PageStore for InMemoryStore {
    fn read_page(&self, pid: PageId) -> DbResult<Page> {
        let pages = self.pages.lock().unwrap();
        let bytes = pages.get(&pid).cloned().unwrap_or_else(|| vec![0u8; PAGE_SIZE]);
        Ok(Page::new(pid, bytes))
    }

    fn write_page(&self, page: &Page) -> DbResult<()> {
        self.pages.lock().unwrap().insert(page.id(), page.bytes().to_vec());
        Ok(())
    }
}

/// A single table backed by a growable list of pages, each holding a
/// simple length-prefixed record slotting scheme. Good enough to exercise
/// insert/delete/scan without implementing a real page format.
pub struct InMemoryTableFile {
    table_id: TableId,
    store: Arc<InMemoryStore>,
    page_count: AtomicUsize,
    /// Set once via `set_pool` after the owning `BufferPool` exists. `Weak`
    /// because the pool's `Catalog` holds this table by `Arc`, so a strong
    /// reference back would be a cycle.
    pool: Mutex<Option<Weak<BufferPool>>>,
}

impl InMemoryTableFile {
    pub fn new(table_id: TableId, store: Arc<InMemoryStore>) -> Self {
        Self {
            table_id,
            store,
            page_count: AtomicUsize::new(0),
            pool: Mutex::new(None),
        }
    }

    /// Wires this table back to the pool whose catalog holds it. `insert`/
    /// `delete` call back into `pool.get_page` to pin the pages they touch,
    /// so this must run before either is called — see `setup` below, which
    /// does this as part of constructing a table/pool pair.
    pub fn set_pool(&self, pool: Weak<BufferPool>) {
        *self.pool.lock().unwrap() = Some(pool);
    }

    fn pool(&self) -> Arc<BufferPool> {
        self.pool
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("InMemoryTableFile used before set_pool (use testkit::setup)")
    }

    fn page_ids(&self) -> Vec<PageId> {
        (0..self.page_count.load(Ordering::SeqCst))
            .map(|n| PageId::new(self.table_id, n))
            .collect()
    }

    /// Reads every live (non-tombstoned) tuple directly off the store,
    /// bypassing the buffer pool. Used by tests to check the round-trip
    /// law after a commit.
    pub fn scan(&self) -> DbResult<Vec<Tuple>> {
        let mut out = Vec::new();
        for pid in self.page_ids() {
            let page = self.store.read_page(pid)?;
            for (_, payload) in records(page.bytes()) {
                out.push(Tuple::new(self.table_id, payload.to_vec()));
            }
        }
        Ok(out)
    }
}

impl TableFile for InMemoryTableFile {
    fn id(&self) -> TableId {
        self.table_id
    }

    /// Pins each candidate page through `get_page(tid, pid, ReadWrite)`
    /// before inspecting or mutating its bytes, so two transactions racing
    /// to insert into the same page are serialized by the exclusive lock
    /// rather than both reading stale bytes from the store and clobbering
    /// each other.
    fn insert(&self, tid: TxnId, tuple: &Tuple) -> DbResult<Vec<Page>> {
        let needed = RECORD_HEADER + tuple.payload.len();
        let pool = self.pool();

        for pid in self.page_ids().into_iter().rev() {
            let mut page = pool.get_page(tid, pid, Permission::ReadWrite)?;
            if let Some(offset) = free_offset(page.bytes(), needed) {
                write_record(page.bytes_mut(), offset, &tuple.payload);
                page.mark_dirty(true, Some(tid));
                return Ok(vec![page]);
            }
        }

        let page_no = self.page_count.fetch_add(1, Ordering::SeqCst);
        let pid = PageId::new(self.table_id, page_no);
        let mut page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        write_record(page.bytes_mut(), 0, &tuple.payload);
        page.mark_dirty(true, Some(tid));
        Ok(vec![page])
    }

    fn delete(&self, tid: TxnId, tuple: &Tuple) -> DbResult<Page> {
        let pool = self.pool();
        for pid in self.page_ids() {
            let mut page = pool.get_page(tid, pid, Permission::ReadWrite)?;
            if let Some(offset) = find_record(page.bytes(), &tuple.payload) {
                tombstone_record(page.bytes_mut(), offset);
                page.mark_dirty(true, Some(tid));
                return Ok(page);
            }
        }
        Err(DbError::NotFound(PageId::new(self.table_id, 0)))
    }
}

/// Builds a `BufferPool` wired to a single in-memory table, resolving the
/// construction cycle between `BufferPool` (owns the `Catalog`, which owns
/// the table) and the table (needs a handle back to the pool to pin pages):
/// build the table and catalog first, build the pool around them, then wire
/// the table's `Weak<BufferPool>` back in.
pub fn setup(config: PoolConfig, table_id: TableId) -> (Arc<BufferPool>, Arc<InMemoryStore>, Arc<InMemoryTableFile>) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let table = Arc::new(InMemoryTableFile::new(table_id, store.clone()));
    catalog.register(table.clone());

    let pool = Arc::new(BufferPool::new(config, store.clone(), catalog));
    table.set_pool(Arc::downgrade(&pool));
    (pool, store, table)
}

/// Like `setup`, but registers `table_ids.len()` independent tables against
/// one pool, for tests that need to dirty pages in more than one table.
pub fn setup_with_tables(config: PoolConfig, table_ids: &[TableId]) -> (Arc<BufferPool>, Arc<InMemoryStore>, Vec<Arc<InMemoryTableFile>>) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let tables: Vec<_> = table_ids
        .iter()
        .map(|&id| {
            let table = Arc::new(InMemoryTableFile::new(id, store.clone()));
            catalog.register(table.clone());
            table
        })
        .collect();

    let pool = Arc::new(BufferPool::new(config, store.clone(), catalog));
    for table in &tables {
        table.set_pool(Arc::downgrade(&pool));
    }
    (pool, store, tables)
}

/// In-memory catalog: a fixed set of tables registered up front.
#[derive(Default)]
pub struct InMemoryCatalog {
    tables: Mutex<HashMap<TableId, Arc<dyn TableFile>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, table: Arc<dyn TableFile>) {
        self.tables.lock().unwrap().insert(table.id(), table);
    }
}

impl Catalog for InMemoryCatalog {
    fn tables(&self) -> Vec<TableId> {
        self.tables.lock().unwrap().keys().copied().collect()
    }

    fn db_file(&self, table_id: TableId) -> Option<Arc<dyn TableFile>> {
        self.tables.lock().unwrap().get(&table_id).cloned()
    }
}

fn record_len(bytes: &[u8], offset: usize) -> usize {
    u32::from_le_bytes(bytes[offset + 1..offset + RECORD_HEADER].try_into().unwrap()) as usize
}

fn records(bytes: &[u8]) -> Vec<(usize, &[u8])> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset + RECORD_HEADER <= bytes.len() {
        let flag = bytes[offset];
        if flag == FLAG_END {
            break;
        }
        let len = record_len(bytes, offset);
        let start = offset + RECORD_HEADER;
        let end = start + len;
        if end > bytes.len() {
            break;
        }
        if flag == FLAG_LIVE {
            out.push((offset, &bytes[start..end]));
        }
        offset = end;
    }
    out
}

fn free_offset(bytes: &[u8], needed: usize) -> Option<usize> {
    let mut offset = 0;
    while offset + RECORD_HEADER <= bytes.len() {
        let flag = bytes[offset];
        if flag == FLAG_END {
            return if offset + needed <= bytes.len() { Some(offset) } else { None };
        }
        offset += RECORD_HEADER + record_len(bytes, offset);
    }
    None
}

fn find_record(bytes: &[u8], payload: &[u8]) -> Option<usize> {
    records(bytes).into_iter().find(|(_, p)| *p == payload).map(|(offset, _)| offset)
}

fn write_record(bytes: &mut [u8], offset: usize, payload: &[u8]) {
    bytes[offset] = FLAG_LIVE;
    bytes[offset + 1..offset + RECORD_HEADER].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes[offset + RECORD_HEADER..offset + RECORD_HEADER + payload.len()].copy_from_slice(payload);
}

fn tombstone_record(bytes: &mut [u8], offset: usize) {
    bytes[offset] = FLAG_TOMBSTONE;
}

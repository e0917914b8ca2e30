//! Contracts for the collaborators this crate consumes but does not
//! implement: on-disk page I/O, the table/schema catalog, and tuple-level
//! mutation inside a page.
//!
//! These are defined as traits at the boundary rather than concrete types
//! reached through a process-wide singleton: a `BufferPool` is handed
//! `Arc<dyn PageStore>` and `Arc<dyn Catalog>` at construction time instead
//! of reaching for ambient global state. Real implementations (actual file
//! layout, actual catalog, actual B+-tree/heap tuple algorithms) are
//! someone else's crate; `crate::testkit` ships minimal in-memory ones for
//! this crate's own tests.

use std::sync::Arc;

use crate::error::DbResult;
use crate::page::{Page, PageId, TableId};
use crate::txn::TxnId;

/// An opaque tuple payload, tagged with the table it belongs to so the
/// façade's `delete` can resolve a `TableFile` from the tuple alone
/// without needing a separate record-id lookup. The buffer pool never
/// interprets `payload`; it only shuttles it to and from `TableFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub table_id: TableId,
    pub payload: Vec<u8>,
}

impl Tuple {
    pub fn new(table_id: TableId, payload: Vec<u8>) -> Self {
        Self { table_id, payload }
    }
}

/// Synchronous, fixed-size-page disk I/O.
pub trait PageStore: Send + Sync {
    fn read_page(&self, pid: PageId) -> DbResult<Page>;
    fn write_page(&self, page: &Page) -> DbResult<()>;
}

/// Table lookup. `db_file` resolves a table id to the `TableFile` that
/// knows how to insert/delete tuples within it.
pub trait Catalog: Send + Sync {
    fn tables(&self) -> Vec<TableId>;
    fn db_file(&self, table_id: TableId) -> Option<Arc<dyn TableFile>>;
}

/// Tuple-level mutation inside a single table's pages. Implementations are
/// expected to call back into `BufferPool::get_page` to pin whatever pages
/// they touch; this crate only carries their return values forward into
/// the cache.
pub trait TableFile: Send + Sync {
    fn id(&self) -> TableId;

    /// Inserts `tuple` under `tid`, returning every page the insert
    /// touched (e.g. a split may dirty more than one page).
    fn insert(&self, tid: TxnId, tuple: &Tuple) -> DbResult<Vec<Page>>;

    /// Deletes `tuple` under `tid`, returning the single page it was
    /// removed from.
    fn delete(&self, tid: TxnId, tuple: &Tuple) -> DbResult<Page>;
}

//! Page identity and the opaque fixed-size page container.
//!
//! The real page formats (B+-tree leaf/internal layouts, heap pages, slot
//! directories, ...) live outside this crate, behind the [`crate::external::PageStore`]
//! contract. What lives here is only the shared envelope the buffer pool
//! itself needs to reason about: an id, a byte buffer, and the dirty/clean
//! + before-image bookkeeping required for commit and abort.

use crate::txn::TxnId;

/// Size of a page in bytes. Fixed for the lifetime of a `BufferPool`.
pub const PAGE_SIZE: usize = 4096;

/// Identifies a table id. Opaque beyond equality/hashing; the real catalog
/// assigns these.
pub type TableId = i32;

/// `(table_id, page_no)`, locating a page within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

/// The level of access a transaction asks for when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// A fixed-size, opaque page held resident in the buffer pool.
///
/// `Page` tracks exactly the state the buffer pool needs to enforce NO
/// STEAL and to roll a transaction back on abort: which transaction (if
/// any) last dirtied it, and a snapshot of its bytes as of the last commit
/// (or the moment it entered the cache).
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    bytes: Vec<u8>,
    before_image: Vec<u8>,
    dirtied_by: Option<TxnId>,
}

impl Page {
    /// Wraps `bytes` (which must be exactly [`PAGE_SIZE`] long) as a page
    /// freshly read from disk. The before-image starts out equal to the
    /// current bytes, since a page that has never been mutated in memory
    /// trivially equals its own snapshot.
    pub fn new(id: PageId, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), PAGE_SIZE, "page {:?} has wrong size", id);
        Self {
            id,
            before_image: bytes.clone(),
            bytes,
            dirtied_by: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// `Some(tid)` if this page has been mutated by `tid` since it was last
    /// clean, `None` if it is clean.
    pub fn is_dirty(&self) -> Option<TxnId> {
        self.dirtied_by
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: Option<TxnId>) {
        self.dirtied_by = if dirty { tid } else { None };
    }

    /// A page holding the before-image bytes, tagged with the same id.
    pub fn before_image(&self) -> Page {
        Page {
            id: self.id,
            bytes: self.before_image.clone(),
            before_image: self.before_image.clone(),
            dirtied_by: None,
        }
    }

    /// Snapshots the current bytes as the new before-image. Called at
    /// commit time for every clean resident page.
    pub fn set_before_image(&mut self) {
        self.before_image = self.bytes.clone();
    }

    /// Carries `other`'s before-image forward onto `self`. Used when a
    /// collaborator (e.g. a `TableFile`) hands back a freshly-read `Page`
    /// for a `PageId` that was already resident: that fresh copy's own
    /// before-image is just its current bytes, which would otherwise
    /// overwrite the snapshot an earlier commit established and break
    /// abort for this page.
    pub fn inherit_before_image(&mut self, resident: &Page) {
        self.before_image = resident.before_image.clone();
    }
}

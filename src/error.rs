//! Error taxonomy of the flash translation layer.

use thiserror::Error;

use crate::config::{BlockId, Counter, Lba, PageId};
use crate::nand::PageState;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FtlError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FtlError {
    /// Program attempted on a page that has not been erased.
    #[error("block {block} page {page}: cannot program, page is {state:?} (erase required)")]
    PageNotFree {
        block: BlockId,
        page: PageId,
        state: PageState,
    },

    /// Invalidation attempted on a page that holds no live data.
    #[error("block {block} page {page}: cannot invalidate, page is {state:?}")]
    PageNotValid {
        block: BlockId,
        page: PageId,
        state: PageState,
    },

    #[error("LBA {lba} is not mapped")]
    NotMapped { lba: Lba },

    #[error("LBA {lba} is outside the logical capacity of {capacity} pages")]
    LbaOutOfRange { lba: Lba, capacity: Counter },

    /// No host-writable free page could be produced for `lba`.
    #[error("device full: no free page for LBA {lba} after {gc_attempts} GC cycles ({free_pages} free pages left, none host-writable)")]
    DeviceFull {
        lba: Lba,
        gc_attempts: Counter,
        free_pages: Counter,
    },

    /// The victim's valid pages do not fit into the free pages outside it.
    #[error("no migration space: victim block {block} holds {valid} valid pages, only {free} free pages elsewhere")]
    NoMigrationSpace {
        block: BlockId,
        valid: Counter,
        free: Counter,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// An L2P entry points at a page that does not hold its LBA.
    #[error("LBA {lba} maps to block {block} page {page}, which is {state:?} holding {held:?}")]
    MappingMismatch {
        lba: Lba,
        block: BlockId,
        page: PageId,
        state: PageState,
        held: Option<Lba>,
    },

    #[error("{valid} valid pages on flash but {mapped} mapped LBAs")]
    ValidCountMismatch { valid: Counter, mapped: Counter },

    #[error("free page accounting drifted: cached {cached}, per-block {counted}, scanned {scanned}")]
    FreeCountDrift {
        cached: Counter,
        counted: Counter,
        scanned: Counter,
    },
}

//! Error types for the index and its storage substrate.

use std::fmt;

use thiserror::Error;

use super::{AttrType, RecordId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Field of the index metadata that disagreed with the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    /// The stored relation name.
    RelationName,
    /// The stored attribute byte offset.
    AttrByteOffset,
    /// The stored attribute type tag.
    AttrType,
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetaField::RelationName => "relation name",
            MetaField::AttrByteOffset => "attribute byte offset",
            MetaField::AttrType => "attribute type",
        };
        f.write_str(name)
    }
}

/// All possible errors raised by the crate.
///
/// Storage errors (I/O, missing pages, exhausted buffer pool) and index
/// errors (metadata mismatch, scan misuse) share one enum so that `?`
/// works across every layer.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., the reserved page).
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// A page could not be dropped from the pool because it is still pinned.
    #[error("Page {0} is still pinned")]
    PagePinned(u32),

    /// Attempted to unpin a page that wasn't pinned.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// A page failed its checksum or carried an unexpected type tag.
    #[error("Page {page_id} is corrupt: {reason}")]
    CorruptPage { page_id: u32, reason: String },

    /// Reopened index metadata disagrees with the requested schema.
    #[error("Index metadata mismatch: {0} differs from the existing index file")]
    ConfigMismatch(MetaField),

    /// Scan bounds must use GT/GTE below and LT/LTE above.
    #[error("Bad scan operators: low bound must be GT or GTE, high bound LT or LTE")]
    BadOperator,

    /// The high bound of a scan is below its low bound.
    #[error("Bad scan range: high bound {high} is below low bound {low}")]
    BadRange { low: i32, high: i32 },

    /// `scan_next` or `end_scan` was called without an active scan.
    #[error("No scan has been started")]
    ScanNotStarted,

    /// Every entry in the scan range has already been returned.
    #[error("Scan has returned every matching entry")]
    ScanExhausted,

    /// Only integer keys are implemented.
    #[error("Unsupported key type: {0:?}")]
    UnsupportedKeyType(AttrType),

    /// A base-relation tuple is too short to hold the indexed attribute.
    #[error("Tuple {rid} has {len} bytes, attribute needs {needed}")]
    TupleTooShort {
        rid: RecordId,
        len: usize,
        needed: usize,
    },

    /// A tuple does not fit in a single heap page.
    #[error("Tuple of {0} bytes does not fit in a page")]
    TupleTooLarge(usize),

    /// Rejected index configuration.
    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a [`Error::CorruptPage`] for the given page.
    pub fn corrupt(page_id: u32, reason: impl Into<String>) -> Self {
        Error::CorruptPage {
            page_id,
            reason: reason.into(),
        }
    }
}

//! Base relations an index is built from.
//!
//! The index only needs a relation's name and a one-shot sequential scan of
//! its tuples; [`RelationSource`] is that boundary. Two sources ship with
//! the crate:
//! - [`MemRelation`] - tuples held in memory, handy for tests
//! - [`HeapFile`] - tuples stored in slotted pages on disk

mod heap_file;
mod mem;

pub use heap_file::HeapFile;
pub use mem::MemRelation;

use crate::common::{RecordId, Result};

/// Tuples of a relation in scan order. `None` marks the end of the data.
pub type TupleIter<'a> = Box<dyn Iterator<Item = Result<(RecordId, Vec<u8>)>> + 'a>;

/// A relation that can be scanned from start to end.
pub trait RelationSource {
    /// Name used for the index file, `<name>.<attr_byte_offset>`.
    fn relation_name(&self) -> &str;

    /// Start a sequential scan over every tuple.
    fn scan(&self) -> Result<TupleIter<'_>>;
}

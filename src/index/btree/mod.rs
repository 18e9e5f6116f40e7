//! Disk-resident B+Tree over integer keys.
//!
//! # Modules
//! - [`node`] - leaf / internal / root-wrapper page layouts and in-node inserts
//! - [`meta`] - the metadata record on page 1
//! - `store` - typed node reads and writes over the buffer pool
//! - `navigator` - root-to-leaf descent
//! - `split` - leaf, internal, and root splits
//! - `scan` - the range-scan cursor
//! - `verify` - integrity walk
//!
//! # File layout
//! ```text
//! page 0   reserved
//! page 1   metadata (relation, attribute, root page id, capacities)
//! page 2   first leaf
//! page 3   root wrapper, until the first split replaces it
//! page 4.. nodes allocated by splits
//! ```

mod index;
pub mod meta;
mod navigator;
pub mod node;
mod scan;
mod split;
mod store;
mod verify;

pub use index::{BTreeIndex, IndexStats};
pub use meta::IndexMeta;
pub use node::{ChildKind, InternalNode, LeafEntry, LeafNode, NodePage, Root};
pub use scan::ScanBounds;
pub use verify::TreeReport;

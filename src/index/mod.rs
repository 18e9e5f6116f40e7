//! Index structures.

pub mod btree;

pub use btree::{BTreeIndex, IndexStats, TreeReport};

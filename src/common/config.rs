//! Configuration constants and the index configuration builder.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::index::btree::node::{MAX_LEAF_CAPACITY, MAX_NODE_CAPACITY};

/// Size of a page in bytes (4KB).
///
/// Every index node (leaf, internal, root wrapper) and the metadata record
/// occupy exactly one page.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Maximum theoretical index file size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Default number of buffer pool frames per open index.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest buffer pool an index accepts.
///
/// A split holds at most two page guards at once and an active scan pins
/// one leaf, so four frames always leave room for eviction.
pub const MIN_POOL_SIZE: usize = 4;

/// Smallest leaf / internal capacity that still bisects into non-empty halves.
pub const MIN_NODE_CAPACITY: usize = 2;

/// Settings used when opening or creating an index.
///
/// Capacities default to what fits in one page. Smaller capacities are
/// useful in tests to force splits with few keys. They only apply when the
/// index file is created; a reopened file keeps the capacities stored in
/// its metadata page.
///
/// # Example
/// ```
/// use bplus_index::IndexConfig;
///
/// let config = IndexConfig::new("/tmp")
///     .with_pool_size(16)
///     .with_leaf_capacity(4);
/// assert_eq!(config.leaf_capacity(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Directory holding the index file.
    pub directory: PathBuf,
    /// Number of buffer pool frames.
    pub pool_size: usize,
    /// Entries per leaf, `None` for the page maximum.
    pub leaf_capacity: Option<usize>,
    /// Keys per internal node, `None` for the page maximum.
    pub node_capacity: Option<usize>,
}

impl IndexConfig {
    /// Configuration rooted at `directory` with default sizes.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = Some(capacity);
        self
    }

    pub fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = Some(capacity);
        self
    }

    /// Effective leaf capacity.
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity.unwrap_or(MAX_LEAF_CAPACITY)
    }

    /// Effective internal node capacity.
    pub fn node_capacity(&self) -> usize {
        self.node_capacity.unwrap_or(MAX_NODE_CAPACITY)
    }

    /// Check sizes against what a page and the split engine can handle.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_size {} is below the minimum of {}",
                self.pool_size, MIN_POOL_SIZE
            )));
        }
        check_capacity("leaf_capacity", self.leaf_capacity(), MAX_LEAF_CAPACITY)?;
        check_capacity("node_capacity", self.node_capacity(), MAX_NODE_CAPACITY)?;
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            pool_size: DEFAULT_POOL_SIZE,
            leaf_capacity: None,
            node_capacity: None,
        }
    }
}

fn check_capacity(name: &str, value: usize, max: usize) -> Result<()> {
    if !(MIN_NODE_CAPACITY..=max).contains(&value) {
        return Err(Error::InvalidConfig(format!(
            "{name} {value} must be between {MIN_NODE_CAPACITY} and {max}"
        )));
    }
    Ok(())
}

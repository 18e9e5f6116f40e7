//! bplus-index - a disk-resident B+Tree over one integer attribute of a
//! relation.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          BTreeIndex                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   Navigator → Node insert | Split engine → Meta page     │   │
//! │  │   Scan cursor over the sibling-linked leaf chain         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + LRU replacer + Stats       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │         DiskManager + Page + PageHeader                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!        ↑ bulk load on creation
//!   relation/ (RelationSource: MemRelation, HeapFile)
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool and its pin protocol
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+Tree
//! - [`relation`] - Base relations an index is built from
//!
//! # Quick Start
//! ```no_run
//! use bplus_index::{AttrType, BTreeIndex, HeapFile, IndexConfig, Operator, Error};
//!
//! let mut orders = HeapFile::create("/tmp/db", "orders")?;
//! for id in 0..1000i32 {
//!     let mut tuple = vec![0u8; 4];
//!     tuple.extend_from_slice(&id.to_le_bytes());
//!     orders.insert(&tuple)?;
//! }
//!
//! // Creates /tmp/db/orders.4 and indexes the i32 at byte offset 4
//! let config = IndexConfig::new("/tmp/db");
//! let mut index = BTreeIndex::open(&orders, 4, AttrType::Integer, &config)?;
//!
//! index.start_scan(100, Operator::Gte, 200, Operator::Lt)?;
//! loop {
//!     match index.scan_next() {
//!         Ok(rid) => println!("{rid}"),
//!         Err(Error::ScanExhausted) => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! index.end_scan()?;
//! index.close()?;
//! # Ok::<(), Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod relation;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{AttrType, Error, IndexConfig, Key, MetaField, Operator, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::{BTreeIndex, IndexStats, TreeReport};
pub use relation::{HeapFile, MemRelation, RelationSource};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;

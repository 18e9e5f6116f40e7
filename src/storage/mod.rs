//! Storage layer - page files and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O over fixed-size pages
//! - [`page`] - The raw page container and its typed header

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;

//! Common types and utilities shared across the crate.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexConfig`]
//! - Error types
//! - Identifiers and values ([`PageId`], [`RecordId`], [`Key`])

pub mod config;
pub mod error;
mod page_id;
mod types;

pub use config::IndexConfig;
pub use error::{Error, MetaField, Result};
pub use page_id::PageId;
pub use types::{AttrType, Key, Operator, RecordId};

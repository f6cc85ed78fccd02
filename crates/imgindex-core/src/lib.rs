//! Core types for imgindex.
//!
//! This crate provides the index snapshot and everything that works on a
//! single directory: listing, item name validation, per-category lookups,
//! item access and snapshot persistence. The concurrent builder lives in
//! `imgindex-scan`.

mod config;
mod error;
mod index;
mod lister;
mod validator;

pub use config::{
    DEFAULT_CONCURRENCY, DEFAULT_EXTENSION, IndexConfig, IndexConfigBuilder,
    IndexConfigBuilderError,
};
pub use error::IndexError;
pub use index::{CategoryContents, Index, ItemKey};
pub use lister::{
    list_files, list_files_until, list_subdirectories, read_items, validate_items,
};
pub use validator::NameValidator;

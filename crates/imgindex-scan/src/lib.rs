//! Parallel index builder for imgindex.
//!
//! This crate turns a dataset laid out as `root/<category>/<item>.<ext>`
//! into an [`Index`] by scanning category directories concurrently.
//!
//! # Overview
//!
//! - **Bounded fan-out**: at most `concurrency` category scans run at once,
//!   each on tokio's blocking pool
//! - **Single aggregator**: the build loop alone merges per-category counts,
//!   so the result does not depend on completion order or on the cap
//! - **All or nothing**: the first unreadable directory or badly named file
//!   aborts the build, and scans still in flight are told to stop
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use imgindex_scan::{IndexBuilder, IndexConfig};
//!
//! # async fn run() -> Result<(), imgindex_scan::IndexError> {
//! let config = IndexConfig::new("/data/imagenet/train").with_concurrency(16);
//! let index = IndexBuilder::new().build(&config).await?;
//!
//! println!("{} items in {} categories", index.total_items(), index.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use imgindex_scan::IndexBuilder;
//!
//! let builder = IndexBuilder::new();
//! let mut progress_rx = builder.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("{}: {} items", progress.category, progress.item_count);
//!     }
//! });
//! ```

mod builder;
mod progress;

pub use builder::{IndexBuilder, PROGRESS_CHANNEL_SIZE};
pub use progress::BuildProgress;

// Re-export core types for convenience
pub use imgindex_core::{
    CategoryContents, DEFAULT_CONCURRENCY, DEFAULT_EXTENSION, Index, IndexConfig, IndexError,
    ItemKey, NameValidator,
};
pub use tokio_util::sync::CancellationToken;

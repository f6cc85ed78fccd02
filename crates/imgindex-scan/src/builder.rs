//! Bounded parallel index builder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use compact_str::CompactString;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use imgindex_core::{
    Index, IndexConfig, IndexError, NameValidator, list_subdirectories, read_items,
};

use crate::progress::BuildProgress;

/// Capacity of the progress broadcast channel.
pub const PROGRESS_CHANNEL_SIZE: usize = 1024;

/// Outcome of scanning one category directory.
struct CategoryScan {
    category: String,
    result: Result<usize, IndexError>,
}

/// Builds an [`Index`] by scanning category directories in parallel.
///
/// At most `IndexConfig::concurrency` directories are scanned at once. Each
/// scan runs on the blocking pool and reports back through a [`JoinSet`];
/// the control loop in [`build`](Self::build) is the only place that touches
/// the aggregated counts. The first failing category aborts the build and
/// signals every scan still running to stop.
pub struct IndexBuilder {
    progress_tx: broadcast::Sender<BuildProgress>,
}

impl IndexBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self { progress_tx }
    }

    /// Subscribe to per-category progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildProgress> {
        self.progress_tx.subscribe()
    }

    /// Build an index of the dataset at `config.root`.
    pub async fn build(&self, config: &IndexConfig) -> Result<Index, IndexError> {
        self.build_with_cancel(config, CancellationToken::new()).await
    }

    /// Build an index, stopping early with [`IndexError::Cancelled`] once
    /// `cancel` fires.
    pub async fn build_with_cancel(
        &self,
        config: &IndexConfig,
        cancel: CancellationToken,
    ) -> Result<Index, IndexError> {
        config.validate()?;
        let start = Instant::now();

        let root = config
            .root
            .canonicalize()
            .map_err(|e| IndexError::io(&config.root, e))?;
        if !root.is_dir() {
            return Err(IndexError::NotADirectory { path: root });
        }

        let categories = list_subdirectories(&root)?;
        info!(
            root = %root.display(),
            categories = categories.len(),
            concurrency = config.concurrency,
            "Building index"
        );

        let counts = self
            .scan_categories(&root, categories, config, cancel.child_token(), start)
            .await?;
        let index = Index::new(root, counts, config.extension.as_str());

        info!(
            categories = index.len(),
            items = index.total_items(),
            elapsed = ?start.elapsed(),
            "Index built"
        );
        Ok(index)
    }

    /// Build an index from synchronous code.
    ///
    /// Spins up a private runtime, so this must not be called from within
    /// an async context.
    pub fn build_blocking(&self, config: &IndexConfig) -> Result<Index, IndexError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("imgindex-build")
            .build()
            .map_err(|e| IndexError::TaskFailed {
                message: format!("Failed to start runtime: {e}"),
            })?;
        runtime.block_on(self.build(config))
    }

    /// Scan every category under the permit cap and merge the counts.
    ///
    /// `cancel` is handed to every scan and is cancelled when this returns,
    /// so scans still running after an abort stop at their next entry.
    async fn scan_categories(
        &self,
        root: &Path,
        categories: Vec<String>,
        config: &IndexConfig,
        cancel: CancellationToken,
        start: Instant,
    ) -> Result<BTreeMap<String, usize>, IndexError> {
        let total = categories.len();
        // Fires on every exit path, including when this future is dropped.
        let _stop_scans = cancel.clone().drop_guard();

        let permits = Arc::new(Semaphore::new(config.concurrency));
        let validator = NameValidator::new(&config.extension);
        let mut pending = categories.into_iter();
        let mut tasks = JoinSet::new();

        let mut counts = BTreeMap::new();
        let mut completed = 0usize;
        let mut running_total = 0usize;

        while completed < total {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(completed, total, "Build cancelled");
                    return Err(IndexError::Cancelled);
                }

                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let Some(joined) = joined else { continue };
                    let CategoryScan { category, result } = joined.map_err(|e| {
                        IndexError::TaskFailed { message: e.to_string() }
                    })?;

                    let item_count = match result {
                        Ok(count) => count,
                        Err(err) => {
                            warn!(category = %category, error = %err, "Aborting build");
                            return Err(err);
                        }
                    };

                    completed += 1;
                    running_total += item_count;
                    debug!(
                        completed,
                        total,
                        category = %category,
                        items = item_count,
                        running_total,
                        "Category scanned"
                    );
                    let _ = self.progress_tx.send(BuildProgress {
                        completed,
                        total,
                        category: CompactString::from(category.as_str()),
                        item_count,
                        running_total,
                        elapsed: start.elapsed(),
                    });
                    counts.insert(category, item_count);
                }

                permit = Arc::clone(&permits).acquire_owned(), if !pending.as_slice().is_empty() => {
                    let permit = permit.map_err(|e| IndexError::TaskFailed {
                        message: e.to_string(),
                    })?;
                    if let Some(category) = pending.next() {
                        let dir = root.join(&category);
                        spawn_scan(&mut tasks, dir, category, validator.clone(), permit, cancel.clone());
                    }
                }
            }
        }

        Ok(counts)
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Start one category scan on the blocking pool.
///
/// The task owns its permit and releases it when it finishes.
fn spawn_scan(
    tasks: &mut JoinSet<CategoryScan>,
    dir: PathBuf,
    category: String,
    validator: NameValidator,
    permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
) {
    tasks.spawn_blocking(move || {
        let _permit = permit;
        let result = if cancel.is_cancelled() {
            Err(IndexError::Cancelled)
        } else {
            read_items(&dir, &validator, || cancel.is_cancelled()).map(|items| items.len())
        };
        CategoryScan { category, result }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_dataset(categories: usize, items: usize) -> TempDir {
        let temp = TempDir::new().unwrap();
        for c in 0..categories {
            let dir = temp.path().join(format!("n{c:03}"));
            fs::create_dir(&dir).unwrap();
            for i in 0..items {
                fs::write(dir.join(format!("img_{i}.JPEG")), "x").unwrap();
            }
        }
        temp
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_basic_build() {
        let temp = create_dataset(3, 4);
        let index = IndexBuilder::new()
            .build(&IndexConfig::new(temp.path()))
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.total_items(), 12);
        assert_eq!(index.root(), temp.path().canonicalize().unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_files_in_root_are_not_categories() {
        let temp = create_dataset(1, 1);
        fs::write(temp.path().join("LOC_synset_mapping.txt"), "n000 tench").unwrap();

        let index = IndexBuilder::new()
            .build(&IndexConfig::new(temp.path()))
            .await
            .unwrap();
        assert_eq!(index.categories().collect::<Vec<_>>(), vec!["n000"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_config_is_rejected() {
        let temp = create_dataset(1, 1);
        let config = IndexConfig::new(temp.path()).with_concurrency(0);
        let err = IndexBuilder::new().build(&config).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_root_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("index.json");
        fs::write(&file, "{}").unwrap();

        let builder = IndexBuilder::new();
        let err = builder.build(&IndexConfig::new(&file)).await.unwrap_err();
        assert!(matches!(err, IndexError::NotADirectory { .. }));

        let err = builder
            .build(&IndexConfig::new(temp.path().join("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::PathNotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_stops_remaining_scans() {
        let temp = create_dataset(8, 50);
        fs::create_dir(temp.path().join("bad")).unwrap();
        fs::write(temp.path().join("bad/notes.txt"), "x").unwrap();

        let mut categories = vec!["bad".to_string()];
        categories.extend((0..8).map(|c| format!("n{c:03}")));

        let builder = IndexBuilder::new();
        let mut progress_rx = builder.subscribe();
        let parent = CancellationToken::new();
        let scans = parent.child_token();
        let config = IndexConfig::new(temp.path()).with_concurrency(1);

        let err = builder
            .scan_categories(temp.path(), categories, &config, scans.clone(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidName { ref name, .. } if name == "notes.txt"));
        assert!(scans.is_cancelled());
        assert!(!parent.is_cancelled());

        // With one permit, at most the scan started while "bad" was
        // finishing can have reported back.
        let mut completed = 0;
        while progress_rx.try_recv().is_ok() {
            completed += 1;
        }
        assert!(completed <= 1, "{completed} categories completed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_scan_skips_listing() {
        let temp = create_dataset(1, 3);
        let permits = Arc::new(Semaphore::new(1));
        let permit = Arc::clone(&permits).acquire_owned().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut tasks = JoinSet::new();
        spawn_scan(
            &mut tasks,
            temp.path().join("n000"),
            "n000".to_string(),
            NameValidator::default(),
            permit,
            cancel,
        );
        let scan = tasks.join_next().await.unwrap().unwrap();
        assert_eq!(scan.category, "n000");
        assert!(matches!(scan.result, Err(IndexError::Cancelled)));
        assert_eq!(permits.available_permits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stray_subdirectory_fails_build() {
        let temp = create_dataset(2, 2);
        fs::create_dir(temp.path().join("n001/nested")).unwrap();

        let err = IndexBuilder::new()
            .build(&IndexConfig::new(temp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidName { ref name, .. } if name == "nested"));
    }

    #[test]
    fn test_build_blocking() {
        let temp = create_dataset(2, 2);
        let index = IndexBuilder::new()
            .build_blocking(&IndexConfig::new(temp.path()))
            .unwrap();
        assert_eq!(index.total_items(), 4);
    }
}

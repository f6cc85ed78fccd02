//! Index snapshot and the lookups it supports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::default_extension;
use crate::error::IndexError;
use crate::lister::{list_files, validate_items};
use crate::validator::NameValidator;

/// Snapshot of a dataset: its root and the number of items per category.
///
/// Built once and read-only afterwards. Counts are a point-in-time fact and
/// are not refreshed when the dataset changes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    root: PathBuf,
    category_counts: BTreeMap<String, usize>,
    #[serde(default = "default_extension")]
    extension: String,
    #[serde(default)]
    built_at: Option<DateTime<Utc>>,
}

/// Validated base names of the items in one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryContents {
    items: BTreeSet<CompactString>,
}

/// Identifies one item by category and base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub category: CompactString,
    pub name: CompactString,
}

impl ItemKey {
    /// Create a new item key.
    pub fn new(category: impl Into<CompactString>, name: impl Into<CompactString>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

impl CategoryContents {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the category holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if an item base name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    /// Iterate over item base names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(CompactString::as_str)
    }
}

impl FromIterator<String> for CategoryContents {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(CompactString::from).collect(),
        }
    }
}

impl Index {
    /// Create an index from already aggregated counts, stamped with the current time.
    pub fn new(
        root: impl Into<PathBuf>,
        category_counts: BTreeMap<String, usize>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            category_counts,
            extension: extension.into(),
            built_at: Some(Utc::now()),
        }
    }

    /// Dataset root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Item count per category.
    pub fn category_counts(&self) -> &BTreeMap<String, usize> {
        &self.category_counts
    }

    /// Item count of one category.
    pub fn category_count(&self, category: &str) -> Option<usize> {
        self.category_counts.get(category).copied()
    }

    /// Check if a category is part of the index.
    pub fn contains_category(&self, category: &str) -> bool {
        self.category_counts.contains_key(category)
    }

    /// Category names in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.category_counts.keys().map(String::as_str)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.category_counts.len()
    }

    /// Check if the index has no categories.
    pub fn is_empty(&self) -> bool {
        self.category_counts.is_empty()
    }

    /// Total number of items across all categories.
    pub fn total_items(&self) -> usize {
        self.category_counts.values().sum()
    }

    /// Required item extension, without the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// When the index was built, if recorded.
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// The validator this index was built with.
    pub fn validator(&self) -> NameValidator {
        NameValidator::new(&self.extension)
    }

    /// Re-scan one category and return its validated item names.
    ///
    /// The category must be part of the index; unknown categories fail with
    /// [`IndexError::UnknownCategory`] without touching the filesystem. Any
    /// entry that fails validation fails the whole call. Results are never
    /// cached.
    pub fn category_contents(&self, category: &str) -> Result<CategoryContents, IndexError> {
        if !self.contains_category(category) {
            return Err(IndexError::UnknownCategory {
                category: category.to_string(),
            });
        }

        let dir = self.root.join(category);
        let files = list_files(&dir)?;
        let items = validate_items(&dir, &files, &self.validator())?;
        debug!(category, items = items.len(), "Listed category");
        Ok(items.into_iter().collect())
    }

    /// Canonical path of an item: `root/category/name.extension`.
    pub fn item_path(&self, key: &ItemKey) -> PathBuf {
        self.root
            .join(key.category.as_str())
            .join(self.validator().file_name(&key.name))
    }

    /// Open an item for reading.
    ///
    /// No existence check is made beyond the open itself. A missing file is
    /// reported as [`IndexError::ItemNotFound`] carrying the underlying error,
    /// and so is anything that opens but is not a regular file. Other
    /// failures keep their I/O classification.
    pub fn open(&self, key: &ItemKey) -> Result<File, IndexError> {
        let not_found = |source| IndexError::ItemNotFound {
            category: key.category.to_string(),
            name: key.name.to_string(),
            source,
        };
        if !is_single_component(&key.category) || !is_single_component(&key.name) {
            return Err(not_found(None));
        }

        let path = self.item_path(key);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(Some(e)),
            _ => IndexError::io(&path, e),
        })?;
        let metadata = file.metadata().map_err(|e| IndexError::io(&path, e))?;
        if !metadata.is_file() {
            return Err(not_found(None));
        }
        Ok(file)
    }

    /// Write the index as JSON.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Read an index previously written with [`to_writer`](Self::to_writer).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Save the index to a file.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let file = File::create(path).map_err(|e| IndexError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)
            .map_err(|source| IndexError::Serialization {
                path: path.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(|e| IndexError::io(path, e))
    }

    /// Load an index from a file without scanning the dataset.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|source| IndexError::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Keys must name a single entry directly below their parent.
fn is_single_component(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !part.contains(['/', '\\'])
}

//! Index build configuration.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Default number of categories scanned at the same time.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Default item extension, without the leading dot.
pub const DEFAULT_EXTENSION: &str = "JPEG";

/// Configuration for building an index.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Dataset root containing one directory per category.
    pub root: PathBuf,

    /// Maximum number of category scans running at once.
    #[builder(default = "DEFAULT_CONCURRENCY")]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Required, case-sensitive item extension (without the dot).
    #[builder(default = "DEFAULT_EXTENSION.to_string()")]
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

pub(crate) fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            Some(_) => {}
            None => return Err("Root path is required".to_string()),
        }
        if let Some(concurrency) = self.concurrency {
            check_concurrency(concurrency)?;
        }
        if let Some(ref extension) = self.extension {
            check_extension(extension)?;
        }
        Ok(())
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Create a config for a dataset root with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            concurrency: DEFAULT_CONCURRENCY,
            extension: default_extension(),
        }
    }

    /// Set the concurrency cap.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the required item extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Check a config that was assembled by hand or deserialized.
    pub fn validate(&self) -> Result<(), IndexError> {
        let invalid = |message: String| IndexError::InvalidConfig { message };
        if self.root.as_os_str().is_empty() {
            return Err(invalid("Root path cannot be empty".to_string()));
        }
        check_concurrency(self.concurrency).map_err(invalid)?;
        check_extension(&self.extension).map_err(invalid)
    }
}

fn check_concurrency(concurrency: usize) -> Result<(), String> {
    if concurrency == 0 {
        return Err("Concurrency must be at least 1".to_string());
    }
    Ok(())
}

fn check_extension(extension: &str) -> Result<(), String> {
    if extension.is_empty() {
        return Err("Extension cannot be empty".to_string());
    }
    if extension.starts_with('.') {
        return Err(format!("Extension must not start with a dot: {extension}"));
    }
    if extension.contains(['/', '\\']) {
        return Err(format!("Extension must not contain a path separator: {extension}"));
    }
    Ok(())
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

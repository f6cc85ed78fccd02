//! Item name validation shared by the build and query paths.

use std::ffi::OsStr;

use crate::config::default_extension;

/// Checks that a file name is `<base>.<extension>` and extracts `<base>`.
///
/// The builder and the query side both go through this type, so a name
/// accepted while counting is always accepted while listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValidator {
    suffix: String,
}

impl NameValidator {
    /// Create a validator for an extension given without its dot.
    pub fn new(extension: &str) -> Self {
        Self {
            suffix: format!(".{extension}"),
        }
    }

    /// The required extension, without the dot.
    pub fn extension(&self) -> &str {
        &self.suffix[1..]
    }

    /// Return the base name if `file_name` is a valid item name.
    pub fn validate<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.suffix.as_str())
            .filter(|base| !base.is_empty())
    }

    /// Like [`validate`](Self::validate), for raw directory entry names.
    ///
    /// Names that are not valid UTF-8 are never valid.
    pub fn validate_os<'a>(&self, file_name: &'a OsStr) -> Option<&'a str> {
        file_name.to_str().and_then(|name| self.validate(name))
    }

    /// The on-disk file name for an item base name.
    pub fn file_name(&self, base: &str) -> String {
        format!("{base}{}", self.suffix)
    }
}

impl Default for NameValidator {
    fn default() -> Self {
        Self::new(&default_extension())
    }
}

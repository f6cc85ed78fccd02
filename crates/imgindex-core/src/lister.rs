//! Directory listing primitives.
//!
//! A directory that cannot be opened is reported as an error. A missing
//! directory maps to [`IndexError::PathNotFound`], so callers can tell it
//! apart from a directory that exists but is empty (`Ok(vec![])`).

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::error::IndexError;
use crate::validator::NameValidator;

/// List the names of the immediate subdirectories of `dir`.
///
/// Symbolic links are not followed.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>, IndexError> {
    let mut subdirs = Vec::new();
    for (name, is_dir) in read_entries(dir, &|| false)? {
        if !is_dir {
            continue;
        }
        let name = name.into_string().map_err(|name| IndexError::InvalidName {
            path: dir.to_path_buf(),
            name: name.to_string_lossy().into_owned(),
        })?;
        subdirs.push(name);
    }
    Ok(subdirs)
}

/// List the names of every immediate entry of `dir`.
///
/// Subdirectories are included. Inside a category they are items like any
/// other entry and have to pass validation.
pub fn list_files(dir: &Path) -> Result<Vec<OsString>, IndexError> {
    list_files_until(dir, || false)
}

/// Like [`list_files`], but checks `stop` before every entry and bails out
/// with [`IndexError::Cancelled`] once it returns `true`.
pub fn list_files_until(
    dir: &Path,
    stop: impl Fn() -> bool,
) -> Result<Vec<OsString>, IndexError> {
    Ok(read_entries(dir, &stop)?
        .into_iter()
        .map(|(name, _)| name)
        .collect())
}

/// Validate every name listed from the category directory `dir`.
///
/// Returns the base names in listing order. The first name that fails
/// validation turns the whole call into [`IndexError::InvalidName`].
pub fn validate_items(
    dir: &Path,
    files: &[OsString],
    validator: &NameValidator,
) -> Result<Vec<String>, IndexError> {
    files
        .iter()
        .map(|file| {
            validator
                .validate_os(file)
                .map(str::to_string)
                .ok_or_else(|| IndexError::InvalidName {
                    path: dir.to_path_buf(),
                    name: file.to_string_lossy().into_owned(),
                })
        })
        .collect()
}

/// List a category directory and validate every entry, stopping early
/// once `stop` returns `true`.
pub fn read_items(
    dir: &Path,
    validator: &NameValidator,
    stop: impl Fn() -> bool,
) -> Result<Vec<String>, IndexError> {
    let files = list_files_until(dir, stop)?;
    validate_items(dir, &files, validator)
}

/// Read `(name, is_dir)` pairs for every entry in `dir`.
fn read_entries(dir: &Path, stop: &dyn Fn() -> bool) -> Result<Vec<(OsString, bool)>, IndexError> {
    let read_dir = fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        if stop() {
            return Err(IndexError::Cancelled);
        }
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| IndexError::io(entry.path(), e))?;
        entries.push((entry.file_name(), file_type.is_dir()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn create_dir_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("n001")).unwrap();
        fs::create_dir(root.join("n002")).unwrap();
        fs::write(root.join("README"), "not a category").unwrap();
        fs::write(root.join("n001/a.JPEG"), "a").unwrap();
        fs::write(root.join("n001/b.JPEG"), "b").unwrap();
        temp
    }

    #[test]
    fn test_list_subdirectories() {
        let temp = create_dir_tree();
        let mut subdirs = list_subdirectories(temp.path()).unwrap();
        subdirs.sort();
        assert_eq!(subdirs, vec!["n001", "n002"]);
    }

    #[test]
    fn test_list_files_includes_directories() {
        let temp = create_dir_tree();
        let mut files = list_files(temp.path()).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                OsString::from("README"),
                OsString::from("n001"),
                OsString::from("n002")
            ]
        );
    }

    #[test]
    fn test_missing_directory_is_distinct_from_empty() {
        let temp = create_dir_tree();
        assert!(list_files(&temp.path().join("n002")).unwrap().is_empty());
        assert!(matches!(
            list_files(&temp.path().join("n404")),
            Err(IndexError::PathNotFound { .. })
        ));
        assert!(matches!(
            list_subdirectories(&temp.path().join("n404")),
            Err(IndexError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_read_items_validates_every_name() {
        let temp = create_dir_tree();
        let validator = NameValidator::default();

        let mut items = read_items(&temp.path().join("n001"), &validator, || false).unwrap();
        items.sort();
        assert_eq!(items, vec!["a", "b"]);

        fs::write(temp.path().join("n001/notes.txt"), "x").unwrap();
        let err = read_items(&temp.path().join("n001"), &validator, || false).unwrap_err();
        match err {
            IndexError::InvalidName { name, .. } => assert_eq!(name, "notes.txt"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_items_rejects_subdirectories() {
        let temp = create_dir_tree();
        let validator = NameValidator::default();
        let category = temp.path().join("n001");

        // A directory with a valid item name is an item.
        fs::create_dir(category.join("x.JPEG")).unwrap();
        let mut items = read_items(&category, &validator, || false).unwrap();
        items.sort();
        assert_eq!(items, vec!["a", "b", "x"]);

        fs::create_dir(category.join("nested")).unwrap();
        let err = read_items(&category, &validator, || false).unwrap_err();
        assert!(matches!(err, IndexError::InvalidName { ref name, .. } if name == "nested"));
    }

    #[test]
    fn test_stop_cancels_listing() {
        let temp = create_dir_tree();
        let calls = Cell::new(0);
        let result = list_files_until(&temp.path().join("n001"), || {
            calls.set(calls.get() + 1);
            true
        });
        assert!(matches!(result, Err(IndexError::Cancelled)));
        assert_eq!(calls.get(), 1);
    }
}

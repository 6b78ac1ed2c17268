//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::internal_io(
                format!("File not found: {}", path.display()),
                Some(operation.to_string()),
            )
        } else {
            Error::internal_io(e.to_string(), Some(operation.to_string()))
        }
    })
}

/// Write content to file, creating parent directories first.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent, operation)?;
    }
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Create a directory and all of its parents.
pub fn ensure_dir(dir: &Path, operation: &str) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", dir.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Copy a single file, creating the destination directory.
pub fn copy_file(from: &Path, to: &Path, operation: &str) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent, operation)?;
    }
    fs::copy(from, to).map(|_| ()).map_err(|e| {
        Error::internal_io(
            format!("{} -> {}: {}", from.display(), to.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Remove a file or directory tree. Missing paths are not an error.
///
/// Returns true when something was deleted.
pub fn remove_path(path: &Path, operation: &str) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(Error::internal_io(
                format!("{}: {}", path.display(), e),
                Some(operation.to_string()),
            ))
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map(|_| true).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("version.txt");
        write_file(&path, "Version: 1.0", "test write").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Version: 1.0");
    }

    #[test]
    fn remove_path_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("bin");
        fs::create_dir_all(target.join("Release")).unwrap();
        fs::write(target.join("Release").join("app.dll"), "x").unwrap();

        assert!(remove_path(&target, "clean").unwrap());
        assert!(!target.exists());
        assert!(!remove_path(&target, "clean").unwrap());
    }
}

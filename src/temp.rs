//! Temporary directory management for tests
//!
//! This module provides RAII-based temporary directories with automatic cleanup.

use std::fs;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for temporary resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Temporary directory that will be removed with its contents when dropped
    Directory(PathBuf),
}

impl TempGuard {
    /// Get the path to the temporary resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::Directory(path) => path,
        }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        match self {
            TempGuard::Directory(path) => {
                // Silently ignore errors during cleanup
                let _ = fs::remove_dir_all(path);
            }
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates a temporary directory and returns a guard that removes it on drop
///
/// The directory is created in the system's temporary directory with a unique
/// name generated using ULID, so tests running in parallel never share one.
pub(crate) fn create_temp_dir(prefix: &str) -> io::Result<TempGuard> {
    let ulid = ulid::Ulid::new();
    let path = std::env::temp_dir().join(format!("{}_{}", prefix, ulid));

    fs::create_dir_all(&path)?;

    Ok(TempGuard::Directory(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_dir() {
        let temp = create_temp_dir("test").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path.is_absolute());

        let dirname = path.file_name().unwrap().to_str().unwrap();
        assert!(dirname.starts_with("test_"));

        fs::write(path.join("episode.mp4"), b"data").unwrap();

        drop(temp);

        // Directory and contents should be cleaned up
        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_temp_dirs_unique() {
        let temp1 = create_temp_dir("test").unwrap();
        let temp2 = create_temp_dir("test").unwrap();

        assert_ne!(temp1.path(), temp2.path());
        assert!(temp1.path().exists());
        assert!(temp2.path().exists());
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during file operations
#[derive(Debug, Error)]
pub enum FileOperationError {
    /// Failed to create the series download directory
    #[error("Failed to create download directory at {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    // Trim whitespace and dots from start/end
    sanitized.trim_matches(|c: char| c.is_whitespace() || c == '.').to_string()
}

/// Creates `root/<series name>` and returns its path
///
/// The series name is sanitized first; `fallback` (the series id) is used when
/// nothing printable is left. Creating an existing directory is not an error.
pub fn create_download_directory(
    root: &Path,
    series_name: &str,
    fallback: &str,
) -> Result<PathBuf, FileOperationError> {
    let mut folder = sanitize_filename(series_name);
    if folder.is_empty() {
        folder = sanitize_filename(fallback);
    }

    let path = root.join(folder);
    fs::create_dir_all(&path).map_err(|e| FileOperationError::DirectoryCreationFailed {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}

//! Download engine
//!
//! Streams a resolved media file to disk chunk by chunk, reporting progress
//! after every chunk. Failed downloads leave their partial file behind.

use crate::http::TransportError;
use crate::media::ResolvedMedia;
use crate::progress::TaskProgress;
use crate::report::FailureKind;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while downloading a media file
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The media request failed or was rejected
    #[error("Media request failed: {0}")]
    Transport(#[from] TransportError),

    /// The connection broke while reading the body
    #[error("Failed to read media stream from {url}: {source}")]
    StreamRead { url: String, source: io::Error },

    /// The destination file could not be created or written
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

impl DownloadError {
    /// Failure category for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::Transport(_) | DownloadError::StreamRead { .. } => {
                FailureKind::Transport
            }
            DownloadError::WriteFailed { .. } => FailureKind::Write,
        }
    }
}

/// An open media response body
pub struct MediaStream {
    /// Body reader
    pub reader: Box<dyn Read + Send>,
    /// Declared body size, `None` if the server did not send a usable one
    pub content_length: Option<u64>,
}

/// Source of media streams
pub trait MediaStreamer: Send + Sync {
    /// Opens a streaming GET request for `url`
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on network failure or non-2xx status.
    fn open(&self, url: &str) -> Result<MediaStream, TransportError>;
}

/// A single download, created right before streaming starts
pub struct DownloadTask<'s, 'a> {
    /// Media to fetch
    pub media: ResolvedMedia,
    /// Final path of the file
    pub destination: PathBuf,
    /// Progress handle owned by this task
    pub progress: TaskProgress<'s, 'a>,
}

/// Returns the path a resolved media file is stored under
///
/// Primary host files are named after their URL, alternate host files after
/// the title the resolver found. Either way the name is already final, so
/// both land directly in the series directory.
pub fn destination_for(media: &ResolvedMedia, directory: &Path) -> PathBuf {
    directory.join(&media.filename)
}

/// Copies `reader` into a newly created file at `destination`
///
/// The file is written in `chunk_size` pieces and `progress` is updated after
/// each one. Returns the number of bytes written.
pub fn stream_to_file(
    reader: &mut dyn Read,
    content_length: Option<u64>,
    destination: &Path,
    progress: &mut TaskProgress<'_, '_>,
    chunk_size: usize,
    url: &str,
) -> Result<u64, DownloadError> {
    let mut file = File::create(destination).map_err(|e| DownloadError::WriteFailed {
        path: destination.to_path_buf(),
        source: e,
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = vec![0; chunk_size.max(1)];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break, // EOF
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DownloadError::StreamRead {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| DownloadError::WriteFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;

        downloaded += bytes_read as u64;
        progress.update(downloaded, content_length);
    }

    file.flush().map_err(|e| DownloadError::WriteFailed {
        path: destination.to_path_buf(),
        source: e,
    })?;

    Ok(downloaded)
}

/// Runs a download task to completion
///
/// On success the task's progress is marked complete; on failure it is marked
/// failed. In both cases the aggregate counter settles exactly once.
pub fn run_download(
    streamer: &dyn MediaStreamer,
    task: DownloadTask<'_, '_>,
    chunk_size: usize,
) -> Result<u64, DownloadError> {
    let DownloadTask {
        media,
        destination,
        mut progress,
    } = task;

    debug!(url = %media.url, destination = %destination.display(), "Starting download");

    let result = streamer
        .open(&media.url)
        .map_err(DownloadError::from)
        .and_then(|mut stream| {
            stream_to_file(
                &mut stream.reader,
                stream.content_length,
                &destination,
                &mut progress,
                chunk_size,
                &media.url,
            )
        });

    match result {
        Ok(bytes) => {
            progress.finish();
            Ok(bytes)
        }
        Err(e) => {
            progress.fail();
            Err(e)
        }
    }
}

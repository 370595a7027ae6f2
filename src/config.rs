//! Pipeline configuration
//!
//! All tunables of a run live in [`PipelineConfig`]. The defaults mirror what the
//! target site tolerates: a handful of parallel connections, short timeouts and
//! a desktop browser User-Agent.

use std::path::PathBuf;
use std::time::Duration;

/// Folder (relative to the working directory) that receives one subfolder per series
pub const DEFAULT_DOWNLOAD_ROOT: &str = "Downloads";

/// Workers used to look up watch pages
pub const DEFAULT_LOCATE_WORKERS: usize = 4;

/// Workers used to stream media files to disk
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 3;

/// Timeout applied to connecting and to every read of an HTTP exchange
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Size of a single read from a media stream
pub const DEFAULT_CHUNK_SIZE: usize = 8192; // 8KB

/// User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/117.0";

/// Settings for a single series download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Root directory for downloads, the series folder is created below it
    pub download_root: PathBuf,
    /// Size of the worker pool fetching episode pages
    pub locate_workers: usize,
    /// Size of the worker pool resolving and downloading media
    pub download_workers: usize,
    /// Connect and read timeout for HTTP requests
    pub request_timeout: Duration,
    /// Bytes read from a media stream per chunk
    pub chunk_size: usize,
    /// User-Agent header for all requests
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_ROOT),
            locate_workers: DEFAULT_LOCATE_WORKERS,
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Returns a copy with every count raised to at least one
    ///
    /// A pool without workers or a zero sized read buffer would never make
    /// progress, so both are clamped instead of rejected.
    pub fn normalized(mut self) -> Self {
        self.locate_workers = self.locate_workers.max(1);
        self.download_workers = self.download_workers.max(1);
        self.chunk_size = self.chunk_size.max(1);
        self
    }
}

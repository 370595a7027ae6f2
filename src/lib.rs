//! Saturn Downloader - Download every episode of an anime series
//!
//! This library resolves a series page into its episode pages, locates the
//! media behind each episode (falling back to an alternate host where the
//! watch page embeds no playable source) and streams every file to disk on a
//! bounded pool of workers, reporting progress as it goes.

mod config;
mod download;
mod file_operations;
mod http;
mod listing;
mod locator;
mod markup;
mod media;
mod progress;
mod report;
mod series;
mod worker_pool;

#[cfg(test)]
mod temp;
#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use worker_pool::run_bounded;

// Re-export error types
pub use download::DownloadError;
pub use file_operations::FileOperationError;
pub use http::TransportError;
pub use locator::LocateError;
pub use media::{AlternateHostError, MediaExtractionError};
pub use series::SeriesResolveError;

// Re-export pipeline building blocks
pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DOWNLOAD_ROOT, DEFAULT_DOWNLOAD_WORKERS, DEFAULT_LOCATE_WORKERS,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT, PipelineConfig,
};
pub use download::{
    DownloadTask, MediaStream, MediaStreamer, destination_for, run_download, stream_to_file,
};
pub use file_operations::{create_download_directory, sanitize_filename};
pub use http::{HttpClient, PageFetcher, parse_content_length};
pub use listing::parse_episode_pages;
pub use locator::{
    LocateFailure, LocateOutcome, WATCH_MARKER, find_watch_link, locate_watch_url,
    locate_watch_urls,
};
pub use media::{
    ALTERNATE_SERVER_PARAM, AlternateHostResolver, AlternatePage, MediaExtractor,
    PRIMARY_MEDIA_TYPE, ResolvedMedia, TokenizedHostResolver, alternate_page_url,
    filename_from_url, find_alternate_link, find_primary_source, parse_alternate_page,
};
pub use progress::{ProgressCallback, ProgressSnapshot, ProgressState, TaskProgress, percentage};
pub use report::{EpisodeOutcome, EpisodeReport, FailureKind, FailureRecord, SeriesReport};
pub use series::{
    NAME_SUFFIXES, SeriesRef, extract_raw_title, extract_series_id, format_display_name,
    resolve_series, strip_id_suffix,
};

/// Progress event emitted while a series is processed
///
/// Events for individual downloads may arrive from any download worker, so
/// their order is only meaningful per `task`.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The series page was parsed and its download directory exists
    SeriesResolved { series: SeriesRef, directory: PathBuf },

    /// Episode pages found on the series page
    EpisodesListed { count: usize },

    /// Watch pages were looked up for every episode
    WatchUrlsLocated { located: usize, failed: usize },

    /// The download stage starts with `total` episodes
    DownloadsQueued { total: usize },

    /// A download started streaming
    DownloadStarted {
        task: usize,
        total: usize,
        label: String,
    },

    /// A chunk of a download was written
    ///
    /// `percent` is `None` while the size of the file is unknown.
    DownloadProgress {
        task: usize,
        downloaded: u64,
        total_bytes: Option<u64>,
        percent: Option<f64>,
    },

    /// An episode of the download stage ended, successfully or not
    DownloadFinished {
        task: usize,
        success: bool,
        completed: usize,
        failed: usize,
        total: usize,
    },

    /// The series is done
    Complete { downloaded: usize, failed: usize },
}

/// Top-level error type for series downloads
///
/// Only the failures that abort a whole series show up here. Everything that
/// goes wrong for a single episode is recorded in the [`SeriesReport`].
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// The HTTP client could not be set up
    #[error("HTTP client error: {0}")]
    Client(#[source] TransportError),

    /// The series page could not be fetched
    #[error("Failed to fetch series page: {0}")]
    SeriesPage(#[from] TransportError),

    /// The series URL or page is unusable
    #[error("Series resolution error: {0}")]
    SeriesResolve(#[from] SeriesResolveError),

    /// The download directory could not be created
    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),
}

/// Downloads every episode of the series at `series_url`
///
/// The series page is fetched and parsed first; any failure up to and
/// including the creation of `<download root>/<series name>` aborts the run.
/// Afterwards each episode is handled on its own: failures are logged and
/// recorded in the returned report, but never stop the other episodes.
///
/// Progress events are emitted through the provided callback, which is
/// invoked from worker threads and therefore has to be `Sync`.
///
/// # Examples
///
/// ```no_run
/// use saturn_downloader::{PipelineConfig, ProgressEvent, download_series};
///
/// let report = download_series(
///     "https://example.org/anime/my-show",
///     &PipelineConfig::default(),
///     |event| {
///         if let ProgressEvent::DownloadFinished { completed, total, .. } = event {
///             println!("{}/{} episodes done", completed, total);
///         }
///     },
/// )
/// .unwrap();
///
/// println!("Downloaded {} episode(s)", report.downloaded());
/// ```
pub fn download_series<F>(
    series_url: &str,
    config: &PipelineConfig,
    progress_callback: F,
) -> Result<SeriesReport, DownloaderError>
where
    F: Fn(ProgressEvent) + Sync,
{
    let client = HttpClient::new(config).map_err(DownloaderError::Client)?;
    let resolver = TokenizedHostResolver::new(&client);

    run_pipeline(
        &client,
        &client,
        &resolver,
        series_url,
        config,
        progress_callback,
    )
}

/// Runs the whole pipeline against the given network collaborators
///
/// This is what [`download_series`] does after building its HTTP client.
pub fn run_pipeline<F>(
    fetcher: &dyn PageFetcher,
    streamer: &dyn MediaStreamer,
    resolver: &dyn AlternateHostResolver,
    series_url: &str,
    config: &PipelineConfig,
    progress_callback: F,
) -> Result<SeriesReport, DownloaderError>
where
    F: Fn(ProgressEvent) + Sync,
{
    // Resolving
    // The id comes from the URL alone, so a bad URL fails before any request
    let id = extract_series_id(series_url)?;
    let html = fetcher.fetch_page(series_url)?;
    let series = SeriesRef {
        id,
        display_name: format_display_name(&extract_raw_title(&html)?),
    };
    let directory =
        create_download_directory(&config.download_root, &series.display_name, &series.id)?;

    info!(series = %series.display_name, directory = %directory.display(), "Resolved series");
    progress_callback(ProgressEvent::SeriesResolved {
        series: series.clone(),
        directory: directory.clone(),
    });

    // Listing
    let episode_pages = parse_episode_pages(&html, series_url, &series.id);
    progress_callback(ProgressEvent::EpisodesListed {
        count: episode_pages.len(),
    });

    // Locating
    let located = locate_watch_urls(fetcher, &episode_pages, config.locate_workers);
    info!(
        located = located.watch_urls.len(),
        failed = located.failures.len(),
        "Located watch pages"
    );
    progress_callback(ProgressEvent::WatchUrlsLocated {
        located: located.watch_urls.len(),
        failed: located.failures.len(),
    });

    let lookup_failures = located
        .failures
        .into_iter()
        .map(|failure| FailureRecord {
            url: failure.episode_page,
            kind: failure.error.kind(),
            message: failure.error.to_string(),
        })
        .collect();

    // Downloading
    let total = located.watch_urls.len();
    progress_callback(ProgressEvent::DownloadsQueued { total });

    let state = ProgressState::new(total, &progress_callback);
    let extractor = MediaExtractor::new(fetcher, resolver);
    let mut episodes = Vec::with_capacity(total);

    run_bounded(
        located.watch_urls.into_iter().enumerate().collect(),
        config.download_workers,
        |(index, watch_url)| {
            process_episode(
                index,
                watch_url,
                &extractor,
                streamer,
                &state,
                &directory,
                config.chunk_size,
            )
        },
        |episode| episodes.push(episode),
    );

    let report = SeriesReport {
        series,
        directory,
        episode_pages: episode_pages.len(),
        lookup_failures,
        episodes,
    };

    info!(
        downloaded = report.downloaded(),
        failed = report.failed(),
        "Series complete"
    );
    progress_callback(ProgressEvent::Complete {
        downloaded: report.downloaded(),
        failed: report.failed(),
    });

    Ok(report)
}

/// Extracts and downloads a single episode, containing every failure
fn process_episode(
    index: usize,
    watch_url: String,
    extractor: &MediaExtractor<'_>,
    streamer: &dyn MediaStreamer,
    state: &ProgressState<'_>,
    directory: &Path,
    chunk_size: usize,
) -> EpisodeReport {
    let media = match extractor.extract(&watch_url) {
        Ok(media) => media,
        Err(error) => {
            warn!(url = %watch_url, error = %error, "Media extraction failed");
            state.record_failure(index);
            return EpisodeReport {
                index,
                watch_url,
                outcome: EpisodeOutcome::Failed {
                    kind: error.kind(),
                    message: error.to_string(),
                },
            };
        }
    };

    let destination = destination_for(&media, directory);
    debug!(url = %media.url, primary = media.is_primary_host, "Queued download");

    let task = DownloadTask {
        media: media.clone(),
        destination: destination.clone(),
        progress: state.start_task(index, format!("Episode {}/{}", index + 1, state.total())),
    };

    let outcome = match run_download(streamer, task, chunk_size) {
        Ok(bytes) => EpisodeOutcome::Downloaded {
            media,
            path: destination,
            bytes,
        },
        Err(error) => {
            warn!(url = %media.url, error = %error, "Download failed");
            EpisodeOutcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
            }
        }
    };

    EpisodeReport {
        index,
        watch_url,
        outcome,
    }
}

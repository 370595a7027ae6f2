//! Video locator
//!
//! Turns episode pages into watch page URLs. Every episode is looked up on its
//! own; a failed lookup costs that one episode and nothing else.

use crate::http::{PageFetcher, TransportError};
use crate::markup::{resolve_href, static_selector};
use crate::report::FailureKind;
use crate::worker_pool::run_bounded;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Substring identifying the link to the embedded player page
pub const WATCH_MARKER: &str = "watch?file=";

static SEL_ANCHOR: OnceLock<Selector> = OnceLock::new();

fn sel_anchor() -> &'static Selector {
    SEL_ANCHOR.get_or_init(|| static_selector("a[href]"))
}

/// Reasons an episode page yields no watch URL
#[derive(Debug, Error)]
pub enum LocateError {
    /// The episode page could not be fetched
    #[error("Failed to fetch episode page: {0}")]
    Fetch(#[from] TransportError),

    /// The episode page has no link containing the watch marker
    #[error("No watch link found on {url}")]
    WatchLinkNotFound { url: String },
}

impl LocateError {
    /// Failure category for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            LocateError::Fetch(_) => FailureKind::PageFetch,
            LocateError::WatchLinkNotFound { .. } => FailureKind::WatchLinkNotFound,
        }
    }
}

/// Failed lookup of a single episode page
#[derive(Debug)]
pub struct LocateFailure {
    /// Episode page that was looked up
    pub episode_page: String,
    /// Why no watch URL was produced
    pub error: LocateError,
}

/// Result of looking up a batch of episode pages
#[derive(Debug, Default)]
pub struct LocateOutcome {
    /// Watch URLs in completion order
    pub watch_urls: Vec<String>,
    /// Episode pages that produced no watch URL
    pub failures: Vec<LocateFailure>,
}

/// Returns the first link (document order) whose target contains [`WATCH_MARKER`]
pub fn find_watch_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document
        .select(sel_anchor())
        .filter_map(|anchor| anchor.value().attr("href"))
        .find(|href| href.contains(WATCH_MARKER))
        .map(|href| resolve_href(page_url, href))
}

/// Fetches one episode page and extracts its watch URL
pub fn locate_watch_url(
    fetcher: &dyn PageFetcher,
    episode_page: &str,
) -> Result<String, LocateError> {
    let html = fetcher.fetch_page(episode_page)?;

    find_watch_link(&html, episode_page).ok_or_else(|| LocateError::WatchLinkNotFound {
        url: episode_page.to_string(),
    })
}

/// Looks up all episode pages on a pool of `workers` threads
///
/// Failures are logged and collected, they never abort the batch. The watch
/// URLs come back in the order the lookups finished.
pub fn locate_watch_urls(
    fetcher: &dyn PageFetcher,
    episode_pages: &[String],
    workers: usize,
) -> LocateOutcome {
    let mut outcome = LocateOutcome::default();

    run_bounded(
        episode_pages.to_vec(),
        workers,
        |page| {
            let result = locate_watch_url(fetcher, &page);
            (page, result)
        },
        |(page, result)| match result {
            Ok(watch_url) => {
                debug!(episode_page = %page, watch_url = %watch_url, "Located watch page");
                outcome.watch_urls.push(watch_url);
            }
            Err(error) => {
                warn!(episode_page = %page, error = %error, "Episode lookup failed");
                outcome.failures.push(LocateFailure {
                    episode_page: page,
                    error,
                });
            }
        },
    );

    outcome
}

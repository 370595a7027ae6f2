//! Media extraction
//!
//! Finds the downloadable file behind a watch page. Watch pages either embed the
//! file directly in a `<source>` element (primary host) or link out to a file
//! host that needs its download URL reconstructed (alternate host).
mod alternate_host;

pub use alternate_host::{
    AlternateHostError, AlternateHostResolver, AlternatePage, TokenizedHostResolver,
    parse_alternate_page,
};

use crate::http::{PageFetcher, TransportError};
use crate::markup::{resolve_href, static_selector};
use crate::report::FailureKind;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// MIME type of the embedded primary source
pub const PRIMARY_MEDIA_TYPE: &str = "video/mp4";

/// Query parameter asking the watch page for its alternate server
pub const ALTERNATE_SERVER_PARAM: &str = "&server=1";

static SEL_PRIMARY_SOURCE: OnceLock<Selector> = OnceLock::new();
static SEL_NEW_TAB_LINK: OnceLock<Selector> = OnceLock::new();

fn sel_primary_source() -> &'static Selector {
    SEL_PRIMARY_SOURCE.get_or_init(|| static_selector(r#"source[type="video/mp4"][src]"#))
}

fn sel_new_tab_link() -> &'static Selector {
    SEL_NEW_TAB_LINK.get_or_init(|| static_selector(r#"a[href][target="_blank"]"#))
}

/// Errors that prevent an episode's media from being located
#[derive(Debug, Error)]
pub enum MediaExtractionError {
    /// The watch page (or its alternate variant) could not be fetched
    #[error("Failed to fetch watch page: {0}")]
    Fetch(#[from] TransportError),

    /// Neither a primary source nor an alternate host link exists
    #[error("No alternate host link found on {url}")]
    AlternateLinkNotFound { url: String },

    /// The primary source URL has no path segment to name the file after
    #[error("Cannot derive a file name from {url}")]
    MissingFilename { url: String },

    /// The alternate host could not be resolved
    #[error("Alternate host error: {0}")]
    AlternateHost(#[from] AlternateHostError),
}

impl MediaExtractionError {
    /// Failure category for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            MediaExtractionError::Fetch(_) => FailureKind::PageFetch,
            MediaExtractionError::AlternateLinkNotFound { .. } => {
                FailureKind::AlternateLinkNotFound
            }
            MediaExtractionError::MissingFilename { .. } => FailureKind::MissingFilename,
            MediaExtractionError::AlternateHost(e) => e.kind(),
        }
    }
}

/// A media file ready to be downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMedia {
    /// Direct URL of the file
    pub url: String,
    /// Name the file is stored under
    pub filename: String,
    /// Whether the file comes from the primary host
    pub is_primary_host: bool,
}

/// Returns the `src` of the first non-empty `video/mp4` source element
pub fn find_primary_source(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document
        .select(sel_primary_source())
        .filter_map(|source| source.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

/// Returns the target of the first link that opens in a new tab
pub fn find_alternate_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document
        .select(sel_new_tab_link())
        .filter_map(|anchor| anchor.value().attr("href"))
        .find(|href| !href.trim().is_empty())
        .map(|href| resolve_href(page_url, href))
}

/// Builds the URL of the watch page variant that links the alternate server
pub fn alternate_page_url(watch_url: &str) -> String {
    format!("{}{}", watch_url, ALTERNATE_SERVER_PARAM)
}

/// Returns the last non-empty path segment of `media_url`
///
/// Query string and fragment are not part of the name.
pub fn filename_from_url(media_url: &str) -> Option<String> {
    let segment = match Url::parse(media_url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => media_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.split('/').filter(|s| !s.is_empty()).last())
            .map(str::to_string),
    };

    segment.filter(|name| !name.is_empty())
}

/// Resolves watch pages into downloadable media
///
/// The primary source is preferred; the alternate host is only consulted when
/// the watch page does not embed a playable source.
pub struct MediaExtractor<'a> {
    fetcher: &'a dyn PageFetcher,
    resolver: &'a dyn AlternateHostResolver,
}

impl<'a> MediaExtractor<'a> {
    /// Creates an extractor using `fetcher` for watch pages and `resolver` for the fallback
    pub fn new(fetcher: &'a dyn PageFetcher, resolver: &'a dyn AlternateHostResolver) -> Self {
        Self { fetcher, resolver }
    }

    /// Resolves the media behind `watch_url`
    ///
    /// # Errors
    ///
    /// Fails if a page cannot be fetched, if no alternate host link exists when
    /// the primary source is missing, or if the alternate host cannot be resolved.
    pub fn extract(&self, watch_url: &str) -> Result<ResolvedMedia, MediaExtractionError> {
        let html = self.fetcher.fetch_page(watch_url)?;

        if let Some(src) = find_primary_source(&html) {
            let url = resolve_href(watch_url, &src);
            let filename = filename_from_url(&url)
                .ok_or_else(|| MediaExtractionError::MissingFilename { url: url.clone() })?;

            debug!(watch_url, media_url = %url, "Found primary source");
            return Ok(ResolvedMedia {
                url,
                filename,
                is_primary_host: true,
            });
        }

        debug!(watch_url, "No primary source, trying alternate host");
        let alternate_url = alternate_page_url(watch_url);
        let html = self.fetcher.fetch_page(&alternate_url)?;

        let host_link = find_alternate_link(&html, &alternate_url).ok_or_else(|| {
            MediaExtractionError::AlternateLinkNotFound {
                url: alternate_url.clone(),
            }
        })?;

        Ok(self.resolver.resolve(&host_link)?)
    }
}

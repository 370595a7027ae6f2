//! Series resolution
//!
//! Derives the series identifier from the series URL and the display name from
//! the series page markup.

use crate::markup::static_selector;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

/// Suffixes removed from the end of a series title, checked in this order
pub const NAME_SUFFIXES: &[&str] = &["Sub ITA", "ITA"];

static RE_ID_SUFFIX: OnceLock<Regex> = OnceLock::new();
static SEL_TITLE_CONTAINER: OnceLock<Selector> = OnceLock::new();
static SEL_TITLE_TEXT: OnceLock<Selector> = OnceLock::new();

fn re_id_suffix() -> &'static Regex {
    RE_ID_SUFFIX.get_or_init(|| Regex::new(r"-a+$").expect("compile RE_ID_SUFFIX"))
}

fn sel_title_container() -> &'static Selector {
    SEL_TITLE_CONTAINER
        .get_or_init(|| static_selector("div.container.anime-title-as.mb-3.w-100"))
}

fn sel_title_text() -> &'static Selector {
    SEL_TITLE_TEXT.get_or_init(|| static_selector("b"))
}

/// Errors that abort the resolution of a series
#[derive(Debug, Error)]
pub enum SeriesResolveError {
    /// The URL cannot be parsed or has no path segment to take the id from
    #[error("Invalid series URL: {0}")]
    InvalidUrl(String),

    /// The page lacks the title container or its bold title element
    #[error("Series title not found on the series page")]
    TitleNotFound,
}

/// Identity of a series, computed once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesRef {
    /// Identifier taken from the series URL
    pub id: String,
    /// Title shown to the user and used for the download folder
    pub display_name: String,
}

/// Extracts the series id from the last non-empty path segment of `series_url`
///
/// A trailing `-a`, `-aa`, ... run is stripped, anything else is kept verbatim.
///
/// # Examples
///
/// ```
/// use saturn_downloader::extract_series_id;
///
/// let id = extract_series_id("https://example.org/anime/my-show-aaa").unwrap();
/// assert_eq!(id, "my-show");
/// ```
pub fn extract_series_id(series_url: &str) -> Result<String, SeriesResolveError> {
    let parsed =
        Url::parse(series_url).map_err(|_| SeriesResolveError::InvalidUrl(series_url.to_string()))?;

    let raw_id = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| SeriesResolveError::InvalidUrl(series_url.to_string()))?;

    Ok(strip_id_suffix(raw_id).to_string())
}

/// Removes a trailing hyphen followed by one or more `a` characters
pub fn strip_id_suffix(raw_id: &str) -> &str {
    match re_id_suffix().find(raw_id) {
        Some(found) => &raw_id[..found.start()],
        None => raw_id,
    }
}

/// Reads the raw series title from the series page
///
/// The title is the text of the first `<b>` inside the title container.
pub fn extract_raw_title(html: &str) -> Result<String, SeriesResolveError> {
    let document = Html::parse_document(html);

    let container = document
        .select(sel_title_container())
        .next()
        .ok_or(SeriesResolveError::TitleNotFound)?;

    let title = container
        .select(sel_title_text())
        .next()
        .ok_or(SeriesResolveError::TitleNotFound)?;

    Ok(title.text().collect::<String>().trim().to_string())
}

/// Removes the first matching suffix of [`NAME_SUFFIXES`] and trims the rest
///
/// Names without a known suffix are returned unchanged.
///
/// # Examples
///
/// ```
/// use saturn_downloader::format_display_name;
///
/// assert_eq!(format_display_name("My Show Sub ITA"), "My Show");
/// assert_eq!(format_display_name("My Show"), "My Show");
/// ```
pub fn format_display_name(raw_name: &str) -> String {
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = raw_name.strip_suffix(suffix) {
            return stripped.trim().to_string();
        }
    }
    raw_name.to_string()
}

/// Resolves the series id and display name from its URL and page markup
pub fn resolve_series(series_url: &str, html: &str) -> Result<SeriesRef, SeriesResolveError> {
    let id = extract_series_id(series_url)?;
    let display_name = format_display_name(&extract_raw_title(html)?);
    Ok(SeriesRef { id, display_name })
}

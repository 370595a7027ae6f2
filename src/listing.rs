//! Episode listing parser
//!
//! Collects the episode page links of a series page in document order. The
//! position of a link in the returned list is its episode number.

use crate::markup::{resolve_href, static_selector};
use scraper::{Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

static SEL_EPISODE_BUTTON: OnceLock<Selector> = OnceLock::new();

fn sel_episode_button() -> &'static Selector {
    SEL_EPISODE_BUTTON.get_or_init(|| {
        static_selector(r#"a.btn.btn-dark.mb-1.bottone-ep[href][target="_blank"]"#)
    })
}

/// Extracts the ordered episode page URLs from a series page
///
/// Links are resolved against `page_url`. An empty result is valid and simply
/// leads to zero downloads. `series_id` only annotates the log output, the
/// button markup alone decides what counts as an episode.
pub fn parse_episode_pages(html: &str, page_url: &str, series_id: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let pages: Vec<String> = document
        .select(sel_episode_button())
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| resolve_href(page_url, href))
        .collect();

    debug!(series = series_id, count = pages.len(), "Collected episode pages");
    pages
}

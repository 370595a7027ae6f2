//! Small helpers shared by the HTML scraping stages

use scraper::Selector;
use url::Url;

/// Parses a selector that is known to be valid at compile time
pub(crate) fn static_selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid built-in selector")
}

/// Resolves a link target against the page it was found on
///
/// Absolute targets are returned unchanged. If either side cannot be parsed the
/// raw target is kept, leaving the failure to the request that uses it.
pub(crate) fn resolve_href(page_url: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

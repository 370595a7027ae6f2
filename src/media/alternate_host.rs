//! Alternate host resolver
//!
//! The alternate file host hides its download link: the page carries the link
//! without its token inside a hidden `div`, and a script writes the token into
//! another element at runtime. Both halves are recovered from the raw markup and
//! joined back into a direct download URL.
//!
//! The patterns match the host's current markup. When the host changes its page
//! layout, resolution fails for the affected episode only.

use super::ResolvedMedia;
use crate::file_operations::sanitize_filename;
use crate::http::{PageFetcher, TransportError};
use crate::report::FailureKind;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

static RE_TOKEN: OnceLock<Regex> = OnceLock::new();
static RE_LINK_FRAGMENT: OnceLock<Regex> = OnceLock::new();
static RE_TITLE: OnceLock<Regex> = OnceLock::new();

fn re_token() -> &'static Regex {
    RE_TOKEN.get_or_init(|| {
        Regex::new(
            r#"document\.getElementById\(\s*'norobotlink'\s*\)\.innerHTML\s*=[^;]*?token=([^'";]+)'"#,
        )
        .expect("compile RE_TOKEN")
    })
}

fn re_link_fragment() -> &'static Regex {
    RE_LINK_FRAGMENT.get_or_init(|| {
        Regex::new(
            r#"<div id="ideoooolink" style="display:none;">\s*([^<]*?token=)[^<]*</div>"#,
        )
        .expect("compile RE_LINK_FRAGMENT")
    })
}

fn re_title() -> &'static Regex {
    RE_TITLE.get_or_init(|| {
        Regex::new(r#"<meta name="og:title" content="([^"]*)""#).expect("compile RE_TITLE")
    })
}

/// Errors raised while resolving an alternate host page
#[derive(Debug, Error)]
pub enum AlternateHostError {
    /// The alternate host page could not be fetched
    #[error("Failed to fetch alternate host page: {0}")]
    Fetch(#[from] TransportError),

    /// The token assignment script is missing
    #[error("Download token not found on {url}")]
    TokenNotFound { url: String },

    /// The hidden link container is missing
    #[error("Download link fragment not found on {url}")]
    LinkFragmentNotFound { url: String },

    /// The title metadata field is missing or empty
    #[error("File title not found on {url}")]
    TitleNotFound { url: String },
}

impl AlternateHostError {
    /// Failure category for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            AlternateHostError::Fetch(_) => FailureKind::PageFetch,
            AlternateHostError::TokenNotFound { .. } => FailureKind::TokenNotFound,
            AlternateHostError::LinkFragmentNotFound { .. } => FailureKind::LinkFragmentNotFound,
            AlternateHostError::TitleNotFound { .. } => FailureKind::TitleNotFound,
        }
    }
}

/// Turns an alternate host page URL into a downloadable media location
///
/// Keeping this behind a trait lets the brittle scraping be swapped without
/// touching the pipeline.
pub trait AlternateHostResolver: Send + Sync {
    /// Resolves the page at `url` into a direct media URL and a filename
    fn resolve(&self, url: &str) -> Result<ResolvedMedia, AlternateHostError>;
}

/// Pieces recovered from an alternate host page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternatePage {
    /// Token written by the page script
    pub token: String,
    /// Download link up to and including `token=`
    pub link_fragment: String,
    /// Human readable file title
    pub title: String,
}

impl AlternatePage {
    /// Rebuilds the direct download URL as `https://` + fragment + token
    ///
    /// The fragment is usually protocol relative (`//host/...`); its leading
    /// slashes are dropped so the result always starts with exactly `https://`.
    pub fn download_url(&self) -> String {
        format!(
            "https://{}{}",
            self.link_fragment.trim_start_matches('/'),
            self.token
        )
    }
}

/// Returns group 1 of the last match of `re` in `html`
///
/// The host plants decoy copies of its markers ahead of the live ones.
fn last_capture<'h>(re: &Regex, html: &'h str) -> Option<&'h str> {
    re.captures_iter(html)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extracts token, link fragment and title from the raw page markup
///
/// Each piece is the last match of its pattern over the whole document. The
/// title is rendered as text, so entities are decoded and whitespace runs
/// collapse to a single space.
pub fn parse_alternate_page(url: &str, html: &str) -> Result<AlternatePage, AlternateHostError> {
    let token = last_capture(re_token(), html)
        .map(|token| token.trim().to_string())
        .ok_or_else(|| AlternateHostError::TokenNotFound {
            url: url.to_string(),
        })?;

    let link_fragment = last_capture(re_link_fragment(), html)
        .map(|fragment| fragment.trim().replace("&amp;", "&"))
        .ok_or_else(|| AlternateHostError::LinkFragmentNotFound {
            url: url.to_string(),
        })?;

    // The title is an attribute value and may carry HTML entities
    let title = last_capture(re_title(), html)
        .map(|title| sanitize_filename(nanohtml2text::html2text(title).trim()))
        .filter(|title| !title.is_empty())
        .ok_or_else(|| AlternateHostError::TitleNotFound {
            url: url.to_string(),
        })?;

    Ok(AlternatePage {
        token,
        link_fragment,
        title,
    })
}

/// Resolver for the tokenised file host linked from watch pages
pub struct TokenizedHostResolver<'a> {
    fetcher: &'a dyn PageFetcher,
}

impl<'a> TokenizedHostResolver<'a> {
    /// Creates a resolver that fetches alternate pages through `fetcher`
    pub fn new(fetcher: &'a dyn PageFetcher) -> Self {
        Self { fetcher }
    }
}

impl AlternateHostResolver for TokenizedHostResolver<'_> {
    fn resolve(&self, url: &str) -> Result<ResolvedMedia, AlternateHostError> {
        let html = self.fetcher.fetch_page(url)?;
        let page = parse_alternate_page(url, &html)?;

        Ok(ResolvedMedia {
            url: page.download_url(),
            filename: page.title,
            is_primary_host: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ALTERNATE_PAGE, FakeWeb};

    const URL: &str = "https://files.example.net/e/42";

    #[test]
    fn test_parse_alternate_page() {
        let page = parse_alternate_page(URL, ALTERNATE_PAGE).unwrap();

        assert_eq!(page.token, "Zx9Tok");
        assert_eq!(
            page.link_fragment,
            "/files.example.net/get_video?id=42&expires=99&token="
        );
        assert_eq!(page.title, "My Show Ep 03 SUB ITA.mp4");
    }

    #[test]
    fn test_download_url_joins_fragment_and_token() {
        let page = AlternatePage {
            token: "Zx9Tok".to_string(),
            link_fragment: "files.example.net/get_video?id=42&token=".to_string(),
            title: "ep.mp4".to_string(),
        };
        assert_eq!(
            page.download_url(),
            format!("https://{}{}", page.link_fragment, page.token)
        );

        let protocol_relative = AlternatePage {
            link_fragment: "//files.example.net/get_video?id=42&token=".to_string(),
            ..page
        };
        assert_eq!(
            protocol_relative.download_url(),
            "https://files.example.net/get_video?id=42&token=Zx9Tok"
        );
    }

    #[test]
    fn test_parse_alternate_page_uses_last_markers() {
        let html = r#"<html><head>
            <meta name="og:title" content="Decoy.mp4">
            <meta name="og:title" content="Real.mp4">
            </head><body>
            <div id="ideoooolink" style="display:none;">/decoy.net/get_video?id=1&token=x</div>
            <div id="ideoooolink" style="display:none;">/real.net/get_video?id=2&token=y</div>
            <script>
              document.getElementById('norobotlink').innerHTML = '//decoy.net/get_video?id=1&token=BAD';
              document.getElementById('norobotlink').innerHTML = '//real.net/get_video?id=2&token=GOOD';
            </script>
            </body></html>"#;

        let page = parse_alternate_page(URL, html).unwrap();

        assert_eq!(page.token, "GOOD");
        assert_eq!(page.link_fragment, "/real.net/get_video?id=2&token=");
        assert_eq!(page.title, "Real.mp4");
        assert_eq!(page.download_url(), "https://real.net/get_video?id=2&token=GOOD");
    }

    #[test]
    fn test_title_entities_decoded_and_whitespace_collapsed() {
        let html = ALTERNATE_PAGE.replace(
            "My Show Ep 03 SUB ITA.mp4",
            "Tom &amp; Jerry  Ep 01.mp4",
        );
        let page = parse_alternate_page(URL, &html).unwrap();
        assert_eq!(page.title, "Tom & Jerry Ep 01.mp4");
    }

    #[test]
    fn test_missing_token() {
        let html = ALTERNATE_PAGE.replace("norobotlink", "robotlink");
        assert!(matches!(
            parse_alternate_page(URL, &html),
            Err(AlternateHostError::TokenNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_link_fragment() {
        let html = ALTERNATE_PAGE.replace("ideoooolink", "videolink");
        assert!(matches!(
            parse_alternate_page(URL, &html),
            Err(AlternateHostError::LinkFragmentNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_title() {
        let html = ALTERNATE_PAGE.replace("og:title", "og:description");
        let error = parse_alternate_page(URL, &html).unwrap_err();
        assert_eq!(error.kind(), FailureKind::TitleNotFound);
    }

    #[test]
    fn test_resolver_builds_media() {
        let web = FakeWeb::new().page(URL, ALTERNATE_PAGE);
        let media = TokenizedHostResolver::new(&web).resolve(URL).unwrap();

        assert_eq!(
            media,
            ResolvedMedia {
                url: "https://files.example.net/get_video?id=42&expires=99&token=Zx9Tok"
                    .to_string(),
                filename: "My Show Ep 03 SUB ITA.mp4".to_string(),
                is_primary_host: false,
            }
        );
    }

    #[test]
    fn test_resolver_reports_fetch_failure() {
        let web = FakeWeb::new();
        let error = TokenizedHostResolver::new(&web).resolve(URL).unwrap_err();
        assert_eq!(error.kind(), FailureKind::PageFetch);
    }
}

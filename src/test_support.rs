//! In-memory stand-ins for the network used by unit tests

use crate::download::{MediaStream, MediaStreamer};
use crate::http::{PageFetcher, TransportError};
use std::collections::HashMap;
use std::io::Cursor;

/// Alternate host page carrying a token script, a hidden link and a title
pub(crate) const ALTERNATE_PAGE: &str = r#"<html><head>
    <meta name="og:title" content="My Show Ep 03 SUB ITA.mp4">
    </head><body>
    <div id="ideoooolink" style="display:none;">/files.example.net/get_video?id=42&amp;expires=99&token=stale</div>
    <script>
      document.getElementById('norobotlink').innerHTML = '//files.example.net/get_video?id=42&expires=99&token=Zx9Tok';
    </script>
    </body></html>"#;

struct FakeMedia {
    body: Vec<u8>,
    declare_length: bool,
}

/// Serves canned pages and media; unknown URLs answer with HTTP 404
#[derive(Default)]
pub(crate) struct FakeWeb {
    pages: HashMap<String, String>,
    media: HashMap<String, FakeMedia>,
}

impl FakeWeb {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub(crate) fn media(mut self, url: &str, body: &[u8], declare_length: bool) -> Self {
        self.media.insert(
            url.to_string(),
            FakeMedia {
                body: body.to_vec(),
                declare_length,
            },
        );
        self
    }

    fn not_found(url: &str) -> TransportError {
        TransportError::HttpStatus {
            url: url.to_string(),
            status: 404,
        }
    }
}

impl PageFetcher for FakeWeb {
    fn fetch_page(&self, url: &str) -> Result<String, TransportError> {
        self.pages.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}

impl MediaStreamer for FakeWeb {
    fn open(&self, url: &str) -> Result<MediaStream, TransportError> {
        let media = self.media.get(url).ok_or_else(|| Self::not_found(url))?;

        Ok(MediaStream {
            reader: Box::new(Cursor::new(media.body.clone())),
            content_length: media
                .declare_length
                .then_some(media.body.len() as u64),
        })
    }
}

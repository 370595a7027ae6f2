//! HTTP transport
//!
//! Every network access of the pipeline goes through the [`PageFetcher`] and
//! [`MediaStreamer`](crate::download::MediaStreamer) traits. [`HttpClient`] is the
//! production implementation of both, backed by a blocking `reqwest` client that
//! carries the configured User-Agent and timeouts on every request.

use crate::config::PipelineConfig;
use crate::download::{MediaStream, MediaStreamer};
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONNECTION, CONTENT_LENGTH, HeaderMap};
use thiserror::Error;
use tracing::debug;

/// Errors raised while talking to a remote host
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request could not be sent or its body could not be read
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },
}

impl TransportError {
    /// The URL the failing request was sent to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            TransportError::ClientBuild(_) => None,
            TransportError::Request { url, .. } | TransportError::HttpStatus { url, .. } => {
                Some(url)
            }
        }
    }
}

/// Source of HTML pages
///
/// Implementors must be shareable across the worker pools, hence `Send + Sync`.
pub trait PageFetcher: Send + Sync {
    /// Fetches the page at `url` and returns its body as text
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the request fails or the server answers
    /// with a non-2xx status.
    fn fetch_page(&self, url: &str) -> Result<String, TransportError>;
}

/// Blocking HTTP client used for pages and media streams
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the User-Agent and timeouts of `config`
    pub fn new(config: &PipelineConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(TransportError::ClientBuild)?;

        Ok(Self { client })
    }

    /// Rejects responses outside the 2xx range
    fn check_status(url: &str, response: Response) -> Result<Response, TransportError> {
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl PageFetcher for HttpClient {
    fn fetch_page(&self, url: &str) -> Result<String, TransportError> {
        debug!(url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                source: e,
            })?;

        Self::check_status(url, response)?
            .text()
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                source: e,
            })
    }
}

impl MediaStreamer for HttpClient {
    fn open(&self, url: &str) -> Result<MediaStream, TransportError> {
        debug!(url, "Opening media stream");

        let response = self
            .client
            .get(url)
            .header(CONNECTION, "keep-alive")
            .send()
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                source: e,
            })?;

        let response = Self::check_status(url, response)?;
        let content_length = parse_content_length(response.headers());

        Ok(MediaStream {
            reader: Box::new(response),
            content_length,
        })
    }
}

/// Reads the declared body size from the response headers
///
/// A missing, non-numeric or negative `Content-Length` yields `None`, which the
/// download engine treats as "unknown size".
pub fn parse_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves each canned response to one connection and reports the request head
    fn serve(responses: Vec<String>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                        break;
                    }
                    head.push_str(&line);
                }
                tx.send(head).ok();
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        (address, rx)
    }

    fn client() -> HttpClient {
        HttpClient::new(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_page_returns_body_and_sends_user_agent() {
        let body = "<html>series</html>";
        let (address, requests) = serve(vec![format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )]);

        let page = client().fetch_page(&format!("{}/anime/show", address)).unwrap();
        assert_eq!(page, body);

        let head = requests.recv().unwrap().to_lowercase();
        assert!(head.starts_with("get /anime/show "));
        assert!(head.contains("user-agent: mozilla/5.0"));
    }

    #[test]
    fn test_fetch_page_rejects_error_status() {
        let (address, _requests) = serve(vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        ]);

        let url = format!("{}/missing", address);
        match client().fetch_page(&url) {
            Err(TransportError::HttpStatus { url: failed, status }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected HttpStatus error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_reports_declared_length_and_keep_alive() {
        let (address, requests) = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello".to_string(),
        ]);

        let mut stream = client().open(&format!("{}/ep1.mp4", address)).unwrap();
        assert_eq!(stream.content_length, Some(5));

        let mut body = Vec::new();
        stream.reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hello");

        let head = requests.recv().unwrap().to_lowercase();
        assert!(head.contains("connection: keep-alive"));
    }

    #[test]
    fn test_open_without_length_streams_until_close() {
        let (address, _requests) = serve(vec![
            "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nno length here".to_string(),
        ]);

        let mut stream = client().open(&format!("{}/ep2.mp4", address)).unwrap();
        assert_eq!(stream.content_length, None);

        let mut body = String::new();
        stream.reader.read_to_string(&mut body).unwrap();
        assert_eq!(body, "no length here");
    }

    #[test]
    fn test_parse_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_content_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(parse_content_length(&headers), Some(1024));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("-1"));
        assert_eq!(parse_content_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(parse_content_length(&headers), None);
    }
}

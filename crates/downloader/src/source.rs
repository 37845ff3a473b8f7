use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::{Client, header};
use tokio::time::timeout;
use tracing::debug;

use anime3rb_core::BROWSER_USER_AGENT;

use crate::errors::{DownloadError, Result};

/// an opened transfer: response metadata plus the body as a byte stream.
pub struct MediaStream {
    pub content_type: Option<String>,
    /// declared length, if the server sent one.
    pub total_bytes: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl MediaStream {
    /// true when the declared type cannot be a video file.
    ///
    /// missing or generic types (`application/octet-stream`) are accepted and
    /// left to the size check.
    pub fn is_non_video(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_non_video_type)
    }

    /// true for an html page, e.g. an intermediate download page.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(essence)
            .is_some_and(|e| e == "text/html" || e == "application/xhtml+xml")
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn is_non_video_type(content_type: &str) -> bool {
    let essence = essence(content_type);

    essence.starts_with("text/")
        || essence == "application/json"
        || essence == "application/xhtml+xml"
        || essence == "application/xml"
}

/// capability: open a url as a stream of bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<MediaStream>;
}

/// streams over http with the same browser identity as the page fetcher.
pub struct HttpMediaSource {
    client: Client,
    /// bound on connecting, on waiting for response headers and on each read.
    timeout: Duration,
}

impl HttpMediaSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|source| DownloadError::BuildClient {
                context: "building media client",
                source,
            })?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn open(&self, url: &str) -> Result<MediaStream> {
        let request = self
            .client
            .get(url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .send();
        let response = timeout(self.timeout, request)
            .await
            .map_err(|_| DownloadError::Stalled {
                after: self.timeout,
            })?
            .map_err(|source| DownloadError::Request {
                context: "sending GET request".to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                context: "downloading file".to_string(),
                status: response.status(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total_bytes = response.content_length();

        debug!(%url, ?content_type, ?total_bytes, "opened media stream");

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|source| DownloadError::Request {
                    context: "reading response body".to_string(),
                    source,
                })
            })
            .boxed();

        Ok(MediaStream {
            content_type,
            total_bytes,
            body,
        })
    }
}

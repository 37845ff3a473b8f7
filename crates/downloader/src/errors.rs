use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request client build failed while {context}: {source}")]
    BuildClient {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("http request failed while {context}: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context} returned HTTP {status}")]
    HttpStatus {
        context: String,
        status: reqwest::StatusCode,
    },

    #[error("server answered with {content_type} instead of a video")]
    WrongContentType { content_type: String },

    #[error("file size {written} B is below the {minimum} B minimum; the server likely sent an error page")]
    Undersized { written: u64, minimum: u64 },

    #[error("transfer ended after {written} of {expected} bytes")]
    Truncated { written: u64, expected: u64 },

    #[error("no data received for {}s", .after.as_secs())]
    Stalled { after: Duration },

    #[error("io error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

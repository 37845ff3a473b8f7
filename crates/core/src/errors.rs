use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request client build failed while {context}: {source}")]
    BuildClient {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid url {url}")]
    InvalidUrl { url: String },

    #[error("request failed while fetching {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} answered with a {provider} bot challenge")]
    Challenge { url: String, provider: &'static str },

    #[error("all fetch strategies failed for {url}: {primary}; fallback: {fallback}")]
    Exhausted {
        url: String,
        primary: Box<FetchError>,
        fallback: Box<FetchError>,
    },
}

impl FetchError {
    /// the url the failing request was issued against, when known.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::BuildClient { .. } => None,
            Self::InvalidUrl { url }
            | Self::Request { url, .. }
            | Self::ResponseBody { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::Challenge { url, .. }
            | Self::Exhausted { url, .. } => Some(url),
        }
    }
}

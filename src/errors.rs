use std::path::PathBuf;

use thiserror::Error;

use anime3rb_core::FetchError;

pub type Result<T> = std::result::Result<T, Anime3rbError>;

#[derive(Debug, Error)]
pub enum Anime3rbError {
    #[error("failed to parse anime3rb base URL {base}")]
    BaseUrl { base: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid anime link; unable to parse anime slug from {link}")]
    InvalidAnimeLink { link: String },

    #[error("anime not found or could not be parsed from {url}")]
    AnimeNotFound { url: String },

    #[error(
        "could not determine the episode list of {url}: the page has no episode links and no episode count"
    )]
    EpisodeListUnavailable { url: String },

    #[error("{url} is not a valid page url")]
    InvalidUrl { url: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload sink is not configured: missing {what}")]
    MissingCredential { what: &'static str },

    #[error("failed building upload client: {0}")]
    BuildClient(#[source] reqwest::Error),

    #[error("failed reading {} for upload: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed while uploading {title}: {source}")]
    Request {
        title: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upload of {title} returned {status}\nresponse text:\n{body}")]
    HttpStatus {
        title: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

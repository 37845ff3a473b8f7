pub mod builder;
pub mod client;
pub mod errors;
pub mod markup;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod upload;

pub use builder::*;
pub use client::*;
pub use errors::*;
pub use models::*;
pub use pipeline::*;
pub use upload::*;

pub use anime3rb_core::{FetchConfig, FetchError, RateLimiter};
pub use anime3rb_downloader::{
    DownloadConfig, DownloadEvent, DownloadOutcome, DownloadResult, EventSink, HttpMediaSource,
    MediaSource,
};

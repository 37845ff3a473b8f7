pub mod errors;
pub mod fetcher;

pub use errors::{FetchError, Result};
pub use fetcher::{
    BROWSER_USER_AGENT, FallbackFetcher, Fetch, FetchConfig, HttpFetcher, RateLimiter,
};

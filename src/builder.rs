use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use anime3rb_core::{FallbackFetcher, Fetch, FetchConfig, HttpFetcher, RateLimiter};

use crate::client::Anime3rbClient;
use crate::errors::Result;

const BASE_DOMAIN: &str = "anime3rb.com";

pub struct Anime3rbBuilder {
    base_domain: String,
    cookies: Option<String>,
    timeout: Duration,
    rate_limit: Duration,
}

impl Default for Anime3rbBuilder {
    fn default() -> Self {
        let defaults = FetchConfig::default();
        Self {
            base_domain: BASE_DOMAIN.to_string(),
            cookies: None,
            timeout: defaults.timeout,
            rate_limit: defaults.min_interval,
        }
    }
}

impl Anime3rbBuilder {
    /// creates a new builder with no cookie header configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// sets a raw cookie header string exported from a browser that passed
    /// the bot challenge. it is used by the fallback strategy.
    pub fn cookies_str(mut self, cookies: &str) -> Self {
        let cookies = cookies.trim();
        self.cookies = (!cookies.is_empty()).then(|| cookies.to_string());
        self
    }

    /// sets the base domain for the client.
    pub fn base_domain(mut self, domain: &str) -> Self {
        self.base_domain = domain.trim().trim_end_matches('/').to_string();
        self
    }

    /// per-request timeout, connect included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// minimum spacing between two page requests; zero disables throttling.
    pub fn rate_limit(mut self, interval: Duration) -> Self {
        self.rate_limit = interval;
        self
    }

    /// builds an [`Anime3rbClient`] using the configured options.
    ///
    /// pages are fetched directly first; with cookies configured a failed
    /// direct fetch is retried once with the clearance cookie. both
    /// strategies share one rate limiter.
    pub fn build(&self) -> Result<Anime3rbClient> {
        let limiter = RateLimiter::new(self.rate_limit);
        let config = FetchConfig {
            timeout: self.timeout,
            min_interval: self.rate_limit,
            ..FetchConfig::default()
        };

        let direct: Arc<dyn Fetch> = Arc::new(HttpFetcher::with_limiter(
            config.clone(),
            limiter.clone(),
        )?);

        let fetcher: Arc<dyn Fetch> = match &self.cookies {
            Some(cookies) => {
                debug!("clearance cookie configured; enabling fallback fetch strategy");
                let clearance = HttpFetcher::with_limiter(
                    FetchConfig {
                        cookie_header: Some(cookies.clone()),
                        ..config
                    },
                    limiter,
                )?;
                Arc::new(FallbackFetcher::new(direct, Arc::new(clearance)))
            }
            None => direct,
        };

        Anime3rbClient::new(&self.base_domain, fetcher)
    }
}

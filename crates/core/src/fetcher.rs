use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::errors::{FetchError, Result};

/// browser identity presented on every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CLOUDFLARE_STRONG: &[&str] = &["Just a moment...", "cf_chl_opt", "cf-browser-verification"];
const CLOUDFLARE_WEAK: &[&str] = &["/cdn-cgi/challenge-platform/"];
const DDOS_GUARD_STRONG: &[&str] = &["Checking your browser before accessing"];
const DDOS_GUARD_WEAK: &[&str] = &["DDoS-Guard", "/.well-known/ddos-guard/js-challenge"];

/// capability: fetch a page as text.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// upper bound for a single request, connect included.
    pub timeout: Duration,
    /// minimum spacing between two requests; zero disables throttling.
    pub min_interval: Duration,
    pub user_agent: String,
    /// raw `Cookie` header exported from a browser that already passed the challenge.
    pub cookie_header: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            min_interval: Duration::from_secs(1),
            user_agent: BROWSER_USER_AGENT.to_string(),
            cookie_header: None,
        }
    }
}

/// spaces requests at least `min_interval` apart. clones share the same clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// waits until the next request slot is free and claims it.
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        // the lock is held while sleeping so concurrent callers queue up behind each other
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                debug!(pause_ms = pause.as_millis() as u64, "rate limiting request");
                sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// plain http strategy with a fixed browser identity.
pub struct HttpFetcher {
    client: Client,
    limiter: RateLimiter,
    user_agent: String,
    cookie_header: Option<String>,
    strategy: &'static str,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let limiter = RateLimiter::new(config.min_interval);
        Self::with_limiter(config, limiter)
    }

    /// builds a fetcher that shares `limiter` with other strategies.
    pub fn with_limiter(config: FetchConfig, limiter: RateLimiter) -> Result<Self> {
        info!(
            timeout_ms = config.timeout.as_millis() as u64,
            min_interval_ms = limiter.min_interval().as_millis() as u64,
            clearance = config.cookie_header.is_some(),
            "initializing http fetcher"
        );

        let client = Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|source| FetchError::BuildClient {
                context: "building page fetcher",
                source,
            })?;

        let strategy = if config.cookie_header.is_some() {
            "clearance"
        } else {
            "direct"
        };

        Ok(Self {
            client,
            limiter,
            user_agent: config.user_agent,
            cookie_header: config.cookie_header,
            strategy,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,ar;q=0.8"));

        if let Ok(v) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, v);
        }

        if let Some(cookie) = &self.cookie_header
            && let Ok(v) = HeaderValue::from_str(cookie)
        {
            headers.insert(COOKIE, v);
        }

        headers
    }

    /// names the challenge provider if `body` is an interstitial rather than the page.
    ///
    /// successful responses only count as challenges on strong markers, since
    /// regular pages behind cloudflare embed the challenge-platform script too.
    pub fn detect_challenge(status: StatusCode, body: &str) -> Option<&'static str> {
        let has = |markers: &[&str]| markers.iter().any(|m| body.contains(m));

        if has(CLOUDFLARE_STRONG) || (!status.is_success() && has(CLOUDFLARE_WEAK)) {
            return Some("cloudflare");
        }

        if has(DDOS_GUARD_STRONG) || (!status.is_success() && has(DDOS_GUARD_WEAK)) {
            return Some("ddos-guard");
        }

        None
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        self.limiter.wait().await;
        debug!(%url, strategy = self.strategy, "fetching page");

        let resp = self
            .client
            .get(parsed)
            .headers(self.headers())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| FetchError::ResponseBody {
                url: url.to_string(),
                source,
            })?;

        if let Some(provider) = Self::detect_challenge(status, &body) {
            return Err(FetchError::Challenge {
                url: url.to_string(),
                provider,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        debug!(%url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

/// tries `primary`, then `fallback` once the primary strategy gives up.
pub struct FallbackFetcher {
    primary: Arc<dyn Fetch>,
    fallback: Arc<dyn Fetch>,
}

impl FallbackFetcher {
    pub fn new(primary: Arc<dyn Fetch>, fallback: Arc<dyn Fetch>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Fetch for FallbackFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let primary = match self.primary.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(err) => err,
        };

        warn!(%url, error = %primary, "primary fetch failed; trying fallback strategy");

        self.fallback
            .fetch(url)
            .await
            .map_err(|fallback| FetchError::Exhausted {
                url: url.to_string(),
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            })
    }
}

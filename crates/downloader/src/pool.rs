use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::errors::{DownloadError, Result};
use crate::events::{DownloadEvent, EventSink, ProgressThrottle};
use crate::naming::OutputNaming;
use crate::queue::QueueItem;
use crate::source::{MediaSource, MediaStream};

/// finds the file an html download page links to: `(html, page_url) -> url`.
pub type PageResolver = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// download pages larger than this are cut before being handed to the resolver.
const MAX_PAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// total attempts per item, the first one included.
    pub max_attempts: u32,
    /// fixed pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
    /// completed files below this size are treated as served error pages.
    pub min_file_size: u64,
    /// longest wait for the next chunk before the attempt is abandoned.
    pub stall_timeout: Duration,
    pub progress_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            retry: RetryPolicy::default(),
            min_file_size: 100 * 1024,
            stall_timeout: Duration::from_secs(60),
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl DownloadConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        };
        self
    }

    pub fn min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    pub fn stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub episode: String,
    pub file_name: String,
    pub path: PathBuf,
    pub outcome: DownloadOutcome,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub attempts: u32,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.outcome == DownloadOutcome::Succeeded
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Succeeded => None,
            DownloadOutcome::Failed { reason } => Some(reason),
        }
    }

    fn failed(job: &Job, reason: String, attempts: u32, elapsed: Duration) -> Self {
        Self {
            episode: job.item.episode.clone(),
            file_name: job.file_name.clone(),
            path: job.path.clone(),
            outcome: DownloadOutcome::Failed { reason },
            bytes_written: 0,
            elapsed,
            attempts,
        }
    }
}

/// bounded-concurrency consumer of resolved queue items.
pub struct WorkerPool {
    source: Arc<dyn MediaSource>,
    config: Arc<DownloadConfig>,
    naming: OutputNaming,
    events: Option<EventSink>,
    pages: Option<PageResolver>,
}

impl WorkerPool {
    pub fn new(source: Arc<dyn MediaSource>, config: DownloadConfig) -> Self {
        Self {
            source,
            config: Arc::new(config),
            naming: OutputNaming::new("anime"),
            events: None,
            pages: None,
        }
    }

    pub fn naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn on_event(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// lets workers follow one html download page to the file it links.
    /// without it an html answer is a wrong content type.
    pub fn follow_pages(mut self, resolver: PageResolver) -> Self {
        self.pages = Some(resolver);
        self
    }

    /// downloads every item, never more than `max_concurrency` at once.
    ///
    /// results come back in the order of `items`; a failed item never stops
    /// the others.
    pub async fn run(&self, items: Vec<QueueItem>, max_concurrency: usize) -> Vec<DownloadResult> {
        let limit = max_concurrency.max(1);
        info!(
            items = items.len(),
            max_concurrency = limit,
            dir = %self.config.output_dir.display(),
            "starting worker pool"
        );

        let dir_error = tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .err()
            .map(|source| DownloadError::Io {
                context: format!(
                    "creating output directory {}",
                    self.config.output_dir.display()
                ),
                source,
            });

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut taken = HashSet::new();
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let file_name = self.naming.unique_file_name(&item.episode, &mut taken);
            let job = Job {
                path: self.config.output_dir.join(&file_name),
                file_name,
                item,
                source: Arc::clone(&self.source),
                config: Arc::clone(&self.config),
                events: self.events.clone(),
                pages: self.pages.clone(),
            };

            if let Some(err) = &dir_error {
                job.emit(DownloadEvent::Failed {
                    episode: job.item.episode.clone(),
                    reason: err.to_string(),
                });
                let result = DownloadResult::failed(&job, err.to_string(), 0, Duration::ZERO);
                handles.push(Pending::Settled(result));
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let episode = job.item.episode.clone();
            let file_name = job.file_name.clone();
            let path = job.path.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        return DownloadResult::failed(&job, err.to_string(), 0, Duration::ZERO);
                    }
                };
                job.run().await
            });
            handles.push(Pending::Running {
                episode,
                file_name,
                path,
                handle,
            });
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Pending::Settled(result) => results.push(result),
                Pending::Running {
                    episode,
                    file_name,
                    path,
                    handle,
                } => match handle.await {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        warn!(%episode, error = %err, "download task aborted");
                        discard(&part_path(&path)).await;
                        results.push(DownloadResult {
                            episode,
                            file_name,
                            path,
                            outcome: DownloadOutcome::Failed {
                                reason: format!("download task aborted: {err}"),
                            },
                            bytes_written: 0,
                            elapsed: Duration::ZERO,
                            attempts: 0,
                        });
                    }
                },
            }
        }

        results
    }
}

enum Pending {
    Settled(DownloadResult),
    Running {
        episode: String,
        file_name: String,
        path: PathBuf,
        handle: JoinHandle<DownloadResult>,
    },
}

struct Job {
    item: QueueItem,
    file_name: String,
    path: PathBuf,
    source: Arc<dyn MediaSource>,
    config: Arc<DownloadConfig>,
    events: Option<EventSink>,
    pages: Option<PageResolver>,
}

impl Job {
    fn emit(&self, event: DownloadEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    async fn run(self) -> DownloadResult {
        let started = Instant::now();
        let max_attempts = self.config.retry.max_attempts.max(1);
        let episode = self.item.episode.clone();
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(%episode, attempt, max_attempts, url = %self.item.url, "downloading episode");

            match self.attempt(attempt).await {
                Ok(written) => {
                    let elapsed = started.elapsed();
                    info!(%episode, bytes = written, file = %self.path.display(), "episode downloaded");
                    self.emit(DownloadEvent::Finished {
                        episode: episode.clone(),
                        downloaded_bytes: written,
                        elapsed,
                    });
                    return DownloadResult {
                        episode,
                        file_name: self.file_name.clone(),
                        path: self.path.clone(),
                        outcome: DownloadOutcome::Succeeded,
                        bytes_written: written,
                        elapsed,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    discard(&part_path(&self.path)).await;
                    let reason = err.to_string();

                    if attempt >= max_attempts {
                        warn!(%episode, attempt, error = %reason, "giving up on episode");
                        let reason = format!("failed after {attempt} attempt(s): {reason}");
                        self.emit(DownloadEvent::Failed {
                            episode: episode.clone(),
                            reason: reason.clone(),
                        });
                        return DownloadResult::failed(&self, reason, attempt, started.elapsed());
                    }

                    let delay = self.config.retry.delay;
                    warn!(%episode, attempt, error = %reason, delay_s = delay.as_secs(), "download attempt failed; retrying");
                    self.emit(DownloadEvent::Retrying {
                        episode: episode.clone(),
                        attempt,
                        reason,
                        delay,
                    });
                    sleep(delay).await;
                }
            }
        }
    }

    /// opening counts against the stall timeout too: a server that never
    /// answers must not hold the worker.
    async fn open(&self, url: &str) -> Result<MediaStream> {
        let limit = self.config.stall_timeout;
        timeout(limit, self.source.open(url))
            .await
            .map_err(|_| DownloadError::Stalled { after: limit })?
    }

    /// the video stream of the item, following at most one download page.
    async fn open_media(&self) -> Result<MediaStream> {
        let stream = self.open(&self.item.url).await?;
        if !stream.is_non_video() {
            return Ok(stream);
        }

        let Some(resolver) = self.pages.as_ref().filter(|_| stream.is_html()) else {
            return Err(wrong_type(stream));
        };
        let page_type = stream.content_type.clone().unwrap_or_default();
        let html = self.read_page(stream).await?;

        let Some(target) = resolver(&html, &self.item.url).filter(|t| *t != self.item.url) else {
            warn!(episode = %self.item.episode, url = %self.item.url, "download page links no usable file");
            return Err(DownloadError::WrongContentType {
                content_type: page_type,
            });
        };

        info!(episode = %self.item.episode, page = %self.item.url, url = %target, "following download page");
        let stream = self.open(&target).await?;
        if stream.is_non_video() {
            return Err(wrong_type(stream));
        }
        Ok(stream)
    }

    async fn read_page(&self, mut stream: MediaStream) -> Result<String> {
        let mut page = Vec::new();
        while page.len() < MAX_PAGE_BYTES {
            let next = timeout(self.config.stall_timeout, stream.body.next())
                .await
                .map_err(|_| DownloadError::Stalled {
                    after: self.config.stall_timeout,
                })?;
            let Some(chunk) = next else {
                break;
            };
            page.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&page).into_owned())
    }

    async fn attempt(&self, attempt: u32) -> Result<u64> {
        let mut stream = self.open_media().await?;

        self.emit(DownloadEvent::Started {
            episode: self.item.episode.clone(),
            attempt,
            total_bytes: stream.total_bytes,
        });

        let part = part_path(&self.path);
        let mut file = File::create(&part).await.map_err(|source| DownloadError::Io {
            context: format!("creating output file {}", part.display()),
            source,
        })?;

        let started = Instant::now();
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);
        let mut written = 0u64;

        loop {
            let next = timeout(self.config.stall_timeout, stream.body.next())
                .await
                .map_err(|_| DownloadError::Stalled {
                    after: self.config.stall_timeout,
                })?;

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|source| DownloadError::Io {
                    context: format!("writing output file {}", part.display()),
                    source,
                })?;
            written += chunk.len() as u64;

            if throttle.ready() {
                self.emit(DownloadEvent::Progress {
                    episode: self.item.episode.clone(),
                    downloaded_bytes: written,
                    total_bytes: stream.total_bytes,
                    elapsed: started.elapsed(),
                });
            }
        }

        file.flush().await.map_err(|source| DownloadError::Io {
            context: format!("flushing output file {}", part.display()),
            source,
        })?;
        drop(file);

        if let Some(expected) = stream.total_bytes
            && written < expected
        {
            return Err(DownloadError::Truncated { written, expected });
        }

        if written < self.config.min_file_size {
            return Err(DownloadError::Undersized {
                written,
                minimum: self.config.min_file_size,
            });
        }

        tokio::fs::rename(&part, &self.path)
            .await
            .map_err(|source| DownloadError::Io {
                context: format!("moving {} into place", part.display()),
                source,
            })?;

        Ok(written)
    }
}

fn wrong_type(stream: MediaStream) -> DownloadError {
    DownloadError::WrongContentType {
        content_type: stream.content_type.unwrap_or_default(),
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(file = %path.display(), "removed partial file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(file = %path.display(), error = %err, "failed to remove partial file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream::{self, BoxStream};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tempfile::TempDir;

    const KIB: usize = 1024;

    #[derive(Clone)]
    enum Body {
        Video(usize),
        Html,
        FailFirst(u32, usize),
        ShortOf(usize, u64),
        Page(&'static str),
        Stall,
        Hang,
    }

    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeSource {
        bodies: HashMap<String, Body>,
        opens: Mutex<HashMap<String, u32>>,
        total_opens: AtomicU32,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        chunk_delay: Duration,
    }

    impl FakeSource {
        fn with(mut self, url: &str, body: Body) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        fn chunk_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = delay;
            self
        }

        fn stream(&self, size: usize) -> BoxStream<'static, Result<Bytes>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let guard = ActiveGuard(Arc::clone(&self.active));
            let delay = self.chunk_delay;

            stream::unfold((size, guard), move |(remaining, guard)| async move {
                if remaining == 0 {
                    return None;
                }
                sleep(delay).await;
                let n = remaining.min(64 * KIB);
                Some((Ok(Bytes::from(vec![7u8; n])), (remaining - n, guard)))
            })
            .boxed()
        }
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn open(&self, url: &str) -> Result<MediaStream> {
            self.total_opens.fetch_add(1, Ordering::SeqCst);
            let seen = {
                let mut opens = self.opens.lock().expect("opens lock");
                let n = opens.entry(url.to_string()).or_default();
                *n += 1;
                *n
            };

            match self.bodies.get(url).cloned() {
                Some(Body::Video(size)) => Ok(MediaStream {
                    content_type: Some("video/mp4".into()),
                    total_bytes: Some(size as u64),
                    body: self.stream(size),
                }),
                Some(Body::Html) => Ok(MediaStream {
                    content_type: Some("text/html; charset=UTF-8".into()),
                    total_bytes: None,
                    body: stream::iter(vec![Ok(Bytes::from_static(b"<html></html>"))]).boxed(),
                }),
                Some(Body::FailFirst(failures, size)) if seen > failures => Ok(MediaStream {
                    content_type: Some("video/mp4".into()),
                    total_bytes: Some(size as u64),
                    body: self.stream(size),
                }),
                Some(Body::ShortOf(size, declared)) => Ok(MediaStream {
                    content_type: None,
                    total_bytes: Some(declared),
                    body: self.stream(size),
                }),
                Some(Body::Page(html)) => Ok(MediaStream {
                    content_type: Some("text/html".into()),
                    total_bytes: Some(html.len() as u64),
                    body: stream::iter(vec![Ok(Bytes::from_static(html.as_bytes()))]).boxed(),
                }),
                Some(Body::Stall) => Ok(MediaStream {
                    content_type: Some("video/mp4".into()),
                    total_bytes: Some(400 * KIB as u64),
                    body: stream::iter(vec![Ok(Bytes::from(vec![7u8; KIB]))])
                        .chain(stream::pending())
                        .boxed(),
                }),
                Some(Body::Hang) => std::future::pending().await,
                _ => Err(DownloadError::HttpStatus {
                    context: "downloading file".into(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                }),
            }
        }
    }

    fn config(dir: &TempDir) -> DownloadConfig {
        DownloadConfig::new(dir.path()).retry(3, Duration::ZERO)
    }

    /// first absolute link in the page.
    fn link_finder() -> PageResolver {
        Arc::new(|html: &str, _page: &str| {
            html.split('"')
                .find(|part| part.starts_with("https://"))
                .map(str::to_string)
        })
    }

    fn files_in(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read output dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = FakeSource::default().chunk_delay(Duration::from_millis(20));
        let mut items = Vec::new();
        for n in 1..=5 {
            let url = format!("https://cdn.test/{n}.mp4");
            source = source.with(&url, Body::Video(200 * KIB));
            items.push(QueueItem::new(n.to_string(), url));
        }
        let source = Arc::new(source);

        let pool = WorkerPool::new(source.clone(), config(&dir)).naming(OutputNaming::new("show"));
        let results = pool.run(items, 2).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(DownloadResult::is_success));
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(source.peak.load(Ordering::SeqCst), 2);
        assert_eq!(files_in(&dir).len(), 5);
    }

    #[tokio::test]
    async fn undersized_file_is_deleted_retried_and_reported() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(FakeSource::default().with("https://cdn.test/1.mp4", Body::Video(10 * KIB)));

        let pool = WorkerPool::new(source.clone(), config(&dir));
        let results = pool
            .run(vec![QueueItem::new("1", "https://cdn.test/1.mp4")], 1)
            .await;

        let result = &results[0];
        assert!(!result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(source.total_opens.load(Ordering::SeqCst), 3);
        assert!(result.failure_reason().expect("reason").contains("file size"));
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn html_response_is_a_wrong_content_type() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(FakeSource::default().with("https://cdn.test/1", Body::Html));

        let results = WorkerPool::new(source, config(&dir))
            .run(vec![QueueItem::new("1", "https://cdn.test/1")], 1)
            .await;

        assert!(results[0]
            .failure_reason()
            .expect("reason")
            .contains("instead of a video"));
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn download_page_is_followed_to_the_file() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(
            FakeSource::default()
                .with(
                    "https://site.test/download/1",
                    Body::Page(r#"<div><label>720p</label><a href="https://cdn.test/1.mp4">dl</a></div>"#),
                )
                .with("https://cdn.test/1.mp4", Body::Video(150 * KIB)),
        );

        let results = WorkerPool::new(source.clone(), config(&dir))
            .naming(OutputNaming::new("show"))
            .follow_pages(link_finder())
            .run(vec![QueueItem::new("1", "https://site.test/download/1")], 1)
            .await;

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 1);
        assert_eq!(source.total_opens.load(Ordering::SeqCst), 2);
        assert_eq!(files_in(&dir), ["show-ep-1.mp4"]);
    }

    #[tokio::test]
    async fn download_page_without_a_link_is_a_wrong_content_type() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(
            FakeSource::default().with("https://site.test/download/1", Body::Page("<p>removed</p>")),
        );

        let results = WorkerPool::new(source.clone(), config(&dir))
            .follow_pages(link_finder())
            .run(vec![QueueItem::new("1", "https://site.test/download/1")], 1)
            .await;

        assert!(results[0]
            .failure_reason()
            .expect("reason")
            .contains("instead of a video"));
        assert_eq!(results[0].attempts, 3);
        assert_eq!(source.total_opens.load(Ordering::SeqCst), 3);
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn stalled_transfer_is_retried_and_leaves_no_partial_file() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(FakeSource::default().with("https://cdn.test/1", Body::Stall));
        let config = DownloadConfig::new(dir.path())
            .retry(2, Duration::ZERO)
            .stall_timeout(Duration::from_millis(50));

        let results = WorkerPool::new(source.clone(), config)
            .run(vec![QueueItem::new("1", "https://cdn.test/1")], 1)
            .await;

        let result = &results[0];
        assert!(result.failure_reason().expect("reason").contains("no data received"));
        assert_eq!(result.attempts, 2);
        assert_eq!(source.total_opens.load(Ordering::SeqCst), 2);
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn unanswered_open_is_a_stall() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(FakeSource::default().with("https://cdn.test/1", Body::Hang));
        let config = DownloadConfig::new(dir.path())
            .retry(2, Duration::ZERO)
            .stall_timeout(Duration::from_millis(50));

        let results = timeout(
            Duration::from_secs(5),
            WorkerPool::new(source.clone(), config)
                .run(vec![QueueItem::new("1", "https://cdn.test/1")], 1),
        )
        .await
        .expect("worker gave up in time");

        assert!(results[0]
            .failure_reason()
            .expect("reason")
            .contains("no data received"));
        assert_eq!(source.total_opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(FakeSource::default().with("https://cdn.test/1", Body::FailFirst(2, 150 * KIB)));

        let results = WorkerPool::new(source, config(&dir))
            .naming(OutputNaming::new("show"))
            .run(vec![QueueItem::new("1", "https://cdn.test/1")], 1)
            .await;

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 3);
        assert_eq!(results[0].bytes_written, 150 * KIB as u64);
        assert_eq!(files_in(&dir), ["show-ep-1.mp4"]);
    }

    #[tokio::test]
    async fn truncated_transfer_leaves_no_partial_file() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(
            FakeSource::default().with("https://cdn.test/1", Body::ShortOf(150 * KIB, 400 * 1024)),
        );

        let results = WorkerPool::new(source, config(&dir))
            .run(vec![QueueItem::new("1", "https://cdn.test/1")], 1)
            .await;

        assert!(results[0]
            .failure_reason()
            .expect("reason")
            .contains("transfer ended"));
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_others() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(
            FakeSource::default()
                .with("https://cdn.test/1", Body::Video(120 * KIB))
                .with("https://cdn.test/3", Body::Video(120 * KIB)),
        );
        let items = vec![
            QueueItem::new("1", "https://cdn.test/1"),
            QueueItem::new("2", "https://cdn.test/missing"),
            QueueItem::new("3", "https://cdn.test/3"),
        ];

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let results = WorkerPool::new(source, config(&dir))
            .naming(OutputNaming::new("show").final_episode("3"))
            .on_event(Arc::new(move |event: DownloadEvent| {
                sink_events.lock().expect("events lock").push(event);
            }))
            .run(items, 3)
            .await;

        let outcomes: Vec<_> = results.iter().map(|r| (r.episode.as_str(), r.is_success())).collect();
        assert_eq!(outcomes, [("1", true), ("2", false), ("3", true)]);
        assert_eq!(files_in(&dir), ["show-ep-1.mp4", "show-ep-3 [END].mp4"]);

        let events = events.lock().expect("events lock");
        let finished = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::Finished { .. }))
            .count();
        let failed = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::Failed { .. }))
            .count();
        assert_eq!((finished, failed), (2, 1));
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("output/show-ep-1.mp4")),
            PathBuf::from("output/show-ep-1.mp4.part")
        );
    }
}

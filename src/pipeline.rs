use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use anime3rb_downloader::{
    DownloadConfig, DownloadQueue, DownloadResult, EventSink, MediaSource, OutputNaming,
    PageResolver, QueueItem, WorkerPool,
};

use crate::client::Anime3rbClient;
use crate::errors::Result;
use crate::models::EpisodeRef;
use crate::resolver;

/// an episode that never reached the download queue.
#[derive(Debug, Clone)]
pub struct SkippedEpisode {
    pub episode: String,
    pub reason: String,
}

/// outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// slug of the anime the run was for.
    pub anime: String,
    /// number of episodes the run was asked for.
    pub requested: usize,
    /// download results, in request order.
    pub results: Vec<DownloadResult>,
    /// episodes dropped during resolution, in request order.
    pub skipped: Vec<SkippedEpisode>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// episodes handed to the worker pool.
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// true when nothing resolved and the worker pool never ran.
    pub fn is_empty_run(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_empty_run() {
            return format!(
                "nothing to download for {}: none of the {} requested episode(s) resolved to a download link",
                self.anime, self.requested
            );
        }

        format!(
            "{}: {}/{} downloaded, {} failed, {} skipped",
            self.anime,
            self.succeeded(),
            self.attempted(),
            self.attempted() - self.succeeded(),
            self.skipped.len()
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for result in &self.results {
            match result.failure_reason() {
                None => writeln!(f, "  ok      episode {} -> {}", result.episode, result.file_name)?,
                Some(reason) => writeln!(f, "  failed  episode {}: {reason}", result.episode)?,
            }
        }
        for skipped in &self.skipped {
            writeln!(f, "  skipped episode {}: {}", skipped.episode, skipped.reason)?;
        }
        Ok(())
    }
}

/// one run's parameters.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub anime_url: String,
    pub episodes: Vec<EpisodeRef>,
    pub max_concurrency: usize,
    /// identifier of the series' last episode; its file is tagged `[END]`.
    pub final_episode: Option<String>,
}

/// resolves episode pages to download links, then downloads them.
pub struct Pipeline {
    client: Arc<Anime3rbClient>,
    source: Arc<dyn MediaSource>,
    config: DownloadConfig,
    events: Option<EventSink>,
}

impl Pipeline {
    pub fn new(
        client: Arc<Anime3rbClient>,
        source: Arc<dyn MediaSource>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            client,
            source,
            config,
            events: None,
        }
    }

    /// receives worker progress events for every run.
    pub fn on_event(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn client(&self) -> &Anime3rbClient {
        &self.client
    }

    pub async fn run_download(
        &self,
        anime_url: &str,
        episodes: &[EpisodeRef],
        max_concurrency: usize,
    ) -> Result<RunReport> {
        self.run(RunRequest {
            anime_url: anime_url.to_string(),
            episodes: episodes.to_vec(),
            max_concurrency,
            final_episode: None,
        })
        .await
    }

    /// resolves every requested episode, one page at a time, then downloads
    /// the resolved ones with bounded concurrency.
    ///
    /// a failure on one episode is recorded in the report and never stops the
    /// run; only an unusable anime url is an error.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let anime = Anime3rbClient::anime_slug(&request.anime_url)?;
        let queue = DownloadQueue::new();
        let mut skipped = Vec::new();

        info!(%anime, episodes = request.episodes.len(), "resolving episodes");

        for episode in &request.episodes {
            match self.client.resolve_episode(&episode.url).await {
                Ok(Some(option)) => {
                    info!(episode = %episode.number, quality = %option.quality, "episode resolved");
                    queue.enqueue(QueueItem::new(episode.number.as_str(), option.url));
                }
                Ok(None) => {
                    warn!(episode = %episode.number, url = %episode.url, "no acceptable download option");
                    skipped.push(SkippedEpisode {
                        episode: episode.number.clone(),
                        reason: "no acceptable download option on the episode page".to_string(),
                    });
                }
                Err(err) => {
                    warn!(episode = %episode.number, error = %err, "could not resolve episode");
                    skipped.push(SkippedEpisode {
                        episode: episode.number.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let items = queue.drain_all();
        if items.is_empty() {
            let report = RunReport {
                anime,
                requested: request.episodes.len(),
                results: Vec::new(),
                skipped,
            };
            warn!("{}", report.summary());
            return Ok(report);
        }

        let mut naming = OutputNaming::new(&anime);
        if let Some(last) = &request.final_episode {
            naming = naming.final_episode(last.as_str());
        }

        let mut pool = WorkerPool::new(Arc::clone(&self.source), self.config.clone())
            .naming(naming)
            .follow_pages(download_page_resolver());
        if let Some(events) = &self.events {
            pool = pool.on_event(Arc::clone(events));
        }

        let results = pool.run(items, request.max_concurrency).await;
        let report = RunReport {
            anime,
            requested: request.episodes.len(),
            results,
            skipped,
        };
        info!("{}", report.summary());
        Ok(report)
    }
}

/// a queued link may answer with an intermediate download page; its best
/// quality link is the file.
fn download_page_resolver() -> PageResolver {
    Arc::new(|html: &str, page_url: &str| {
        let page_url = Url::parse(page_url).ok()?;
        resolver::resolve(html, &page_url).map(|option| option.url)
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use anime3rb_downloader::DownloadOutcome;

    use super::*;

    fn result(episode: &str, ok: bool) -> DownloadResult {
        DownloadResult {
            episode: episode.into(),
            file_name: format!("show-ep-{episode}.mp4"),
            path: PathBuf::from(format!("show-ep-{episode}.mp4")),
            outcome: if ok {
                DownloadOutcome::Succeeded
            } else {
                DownloadOutcome::Failed {
                    reason: "failed after 3 attempt(s): timeout".into(),
                }
            },
            bytes_written: 0,
            elapsed: Duration::ZERO,
            attempts: 1,
        }
    }

    #[test]
    fn summary_counts_outcomes() {
        let report = RunReport {
            anime: "show".into(),
            requested: 4,
            results: vec![result("1", true), result("2", false), result("3", true)],
            skipped: vec![SkippedEpisode {
                episode: "4".into(),
                reason: "no acceptable download option on the episode page".into(),
            }],
        };

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.summary(), "show: 2/3 downloaded, 1 failed, 1 skipped");

        let rendered = report.to_string();
        assert!(rendered.contains("ok      episode 1 -> show-ep-1.mp4"));
        assert!(rendered.contains("failed  episode 2"));
        assert!(rendered.contains("skipped episode 4"));
    }

    #[test]
    fn empty_run_is_described() {
        let report = RunReport {
            anime: "show".into(),
            requested: 2,
            results: Vec::new(),
            skipped: Vec::new(),
        };
        assert!(report.is_empty_run());
        assert!(report.summary().starts_with("nothing to download for show"));
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// progress side channel emitted by the worker pool.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started {
        episode: String,
        attempt: u32,
        total_bytes: Option<u64>,
    },
    Progress {
        episode: String,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        elapsed: Duration,
    },
    Retrying {
        episode: String,
        attempt: u32,
        reason: String,
        delay: Duration,
    },
    Finished {
        episode: String,
        downloaded_bytes: u64,
        elapsed: Duration,
    },
    Failed {
        episode: String,
        reason: String,
    },
}

pub type EventSink = Arc<dyn Fn(DownloadEvent) + Send + Sync>;

impl DownloadEvent {
    pub fn episode(&self) -> &str {
        match self {
            Self::Started { episode, .. }
            | Self::Progress { episode, .. }
            | Self::Retrying { episode, .. }
            | Self::Finished { episode, .. }
            | Self::Failed { episode, .. } => episode,
        }
    }

    /// completed share of the transfer in `0.0..=1.0`, when it can be known.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Started { .. } => Some(0.0),
            Self::Progress {
                downloaded_bytes,
                total_bytes: Some(total),
                ..
            } if *total > 0 => Some((*downloaded_bytes as f64 / *total as f64).clamp(0.0, 1.0)),
            Self::Finished { .. } => Some(1.0),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Started {
                episode, attempt, ..
            } => format!("episode {episode}: starting (attempt {attempt})"),
            Self::Progress {
                episode,
                downloaded_bytes,
                elapsed,
                ..
            } => {
                let secs = elapsed.as_secs_f64();
                let speed = if secs > 0.0 {
                    *downloaded_bytes as f64 / (1024.0 * 1024.0 * secs)
                } else {
                    0.0
                };
                match self.fraction() {
                    Some(f) => format!(
                        "episode {episode}: {:.1}% | {speed:.2} MB/s",
                        f * 100.0
                    ),
                    None => format!(
                        "episode {episode}: {downloaded_bytes} bytes | {speed:.2} MB/s"
                    ),
                }
            }
            Self::Retrying {
                episode,
                attempt,
                reason,
                delay,
            } => format!(
                "episode {episode}: attempt {attempt} failed ({reason}); retrying in {}s",
                delay.as_secs()
            ),
            Self::Finished { episode, .. } => format!("episode {episode}: done"),
            Self::Failed { episode, reason } => format!("episode {episode}: failed ({reason})"),
        }
    }
}

/// lets a progress event through at most once per `interval`.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

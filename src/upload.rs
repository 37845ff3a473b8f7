use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::UploadError;
use crate::pipeline::RunReport;

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://graph-video.facebook.com/v19.0";

/// capability: publish one local video file.
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// uploads `path` and returns the destination's response payload.
    async fn upload(&self, path: &Path, title: &str, description: &str)
    -> Result<Value, UploadError>;
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// api root; the request goes to `<endpoint>/<destination_id>/videos`.
    pub endpoint: String,
    pub access_token: Option<String>,
    /// page or account the video is published to.
    pub destination_id: Option<String>,
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            access_token: None,
            destination_id: None,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl UploadConfig {
    pub fn new(access_token: Option<String>, destination_id: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            destination_id: destination_id.filter(|d| !d.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// both credentials, or the first one missing.
    pub fn credentials(&self) -> Result<(&str, &str), UploadError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(UploadError::MissingCredential {
                what: "access token",
            })?;
        let destination =
            self.destination_id
                .as_deref()
                .ok_or(UploadError::MissingCredential {
                    what: "destination id",
                })?;
        Ok((token, destination))
    }
}

/// single multipart POST per video.
pub struct HttpUploadSink {
    client: Client,
    config: UploadConfig,
}

impl HttpUploadSink {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(UploadError::BuildClient)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl UploadSink for HttpUploadSink {
    async fn upload(
        &self,
        path: &Path,
        title: &str,
        description: &str,
    ) -> Result<Value, UploadError> {
        let (token, destination) = self.config.credentials()?;

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        info!(path = %path.display(), bytes = bytes.len(), title, "uploading video");

        let form = Form::new()
            .text("access_token", token.to_string())
            .text("title", title.to_string())
            .text("description", description.to_string())
            .part("source", Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/{destination}/videos", self.config.endpoint);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| UploadError::Request {
                title: title.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());

        if !status.is_success() {
            return Err(UploadError::HttpStatus {
                title: title.to_string(),
                status,
                body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// upload outcome of one downloaded episode.
#[derive(Debug)]
pub struct UploadReport {
    pub episode: String,
    pub title: String,
    pub result: Result<Value, UploadError>,
}

/// uploads every successful download of `report`, one after the other.
///
/// a failed upload is recorded and the next episode is still attempted.
pub async fn upload_all(
    sink: &dyn UploadSink,
    report: &RunReport,
    description: &str,
) -> Vec<UploadReport> {
    let mut uploads = Vec::new();

    for result in report.results.iter().filter(|r| r.is_success()) {
        let title = format!("{} - episode {}", report.anime, result.episode);
        let outcome = sink.upload(&result.path, &title, description).await;

        if let Err(err) = &outcome {
            warn!(episode = %result.episode, "upload failed: {err}");
        }

        uploads.push(UploadReport {
            episode: result.episode.clone(),
            title,
            result: outcome,
        });
    }

    uploads
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use anime3rb_downloader::{DownloadOutcome, DownloadResult};

    use super::*;

    #[tokio::test]
    async fn missing_token_fails_before_touching_the_file() {
        let sink = HttpUploadSink::new(UploadConfig::new(None, Some("1234".into()))).expect("sink");
        let err = sink
            .upload(Path::new("/definitely/not/here.mp4"), "t", "d")
            .await
            .expect_err("missing token");
        assert!(matches!(
            err,
            UploadError::MissingCredential {
                what: "access token"
            }
        ));
    }

    #[tokio::test]
    async fn blank_destination_counts_as_missing() {
        let config = UploadConfig::new(Some("token".into()), Some("  ".into()));
        let sink = HttpUploadSink::new(config).expect("sink");
        let err = sink
            .upload(Path::new("/definitely/not/here.mp4"), "t", "d")
            .await
            .expect_err("missing destination");
        assert!(matches!(
            err,
            UploadError::MissingCredential {
                what: "destination id"
            }
        ));
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(PathBuf, String)>>);

    #[async_trait]
    impl UploadSink for Recorder {
        async fn upload(
            &self,
            path: &Path,
            title: &str,
            _description: &str,
        ) -> Result<Value, UploadError> {
            let mut seen = self.0.lock().unwrap_or_else(|e| e.into_inner());
            seen.push((path.to_path_buf(), title.to_string()));
            Ok(serde_json::json!({ "id": seen.len().to_string() }))
        }
    }

    fn result(episode: &str, outcome: DownloadOutcome) -> DownloadResult {
        DownloadResult {
            episode: episode.into(),
            file_name: format!("show-ep-{episode}.mp4"),
            path: PathBuf::from(format!("out/show-ep-{episode}.mp4")),
            outcome,
            bytes_written: 0,
            elapsed: Duration::ZERO,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn only_successful_downloads_are_uploaded() {
        let report = RunReport {
            anime: "show".into(),
            requested: 2,
            results: vec![
                result("1", DownloadOutcome::Succeeded),
                result(
                    "2",
                    DownloadOutcome::Failed {
                        reason: "boom".into(),
                    },
                ),
            ],
            skipped: Vec::new(),
        };

        let sink = Recorder::default();
        let uploads = upload_all(&sink, &report, "desc").await;

        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].title, "show - episode 1");
        assert!(uploads[0].result.is_ok());
        let seen = sink.0.lock().expect("lock");
        assert_eq!(seen[0].0, PathBuf::from("out/show-ep-1.mp4"));
    }
}

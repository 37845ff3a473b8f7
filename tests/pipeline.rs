use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tempfile::TempDir;

use anime3rb::{
    Anime3rbClient, DownloadConfig, DownloadEvent, EpisodeRef, EventSink, Pipeline, RunRequest,
};
use anime3rb_core::{Fetch, FetchError};
use anime3rb_downloader::{MediaSource, MediaStream};

const VIDEO_SIZE: usize = 200 * 1024;

struct FakeSite(HashMap<String, String>);

#[async_trait]
impl Fetch for FakeSite {
    async fn fetch(&self, url: &str) -> anime3rb_core::Result<String> {
        self.0.get(url).cloned().ok_or_else(|| FetchError::HttpStatus {
            url: url.to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        })
    }
}

/// serves a video for every url, except the html download pages it knows.
#[derive(Default)]
struct FakeCdn {
    opened: AtomicUsize,
    urls: Mutex<Vec<String>>,
    pages: HashMap<String, String>,
}

#[async_trait]
impl MediaSource for FakeCdn {
    async fn open(&self, url: &str) -> anime3rb_downloader::Result<MediaStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().expect("urls lock").push(url.to_string());

        if let Some(page) = self.pages.get(url) {
            let chunks: Vec<anime3rb_downloader::Result<Bytes>> =
                vec![Ok(Bytes::from(page.clone().into_bytes()))];
            return Ok(MediaStream {
                content_type: Some("text/html; charset=UTF-8".to_string()),
                total_bytes: None,
                body: stream::iter(chunks).boxed(),
            });
        }

        let chunks: Vec<anime3rb_downloader::Result<Bytes>> =
            vec![Ok(Bytes::from(vec![7u8; VIDEO_SIZE]))];
        Ok(MediaStream {
            content_type: Some("video/mp4".to_string()),
            total_bytes: Some(VIDEO_SIZE as u64),
            body: stream::iter(chunks).boxed(),
        })
    }
}

fn episode_page(number: u32) -> String {
    format!(
        r#"<html><body>
             <h1>episode {number}</h1>
             <div class="flex-grow flex flex-wrap gap-4 justify-center">
               <div><label>480p</label><a href="https://cdn.example/{number}/480.mp4">تحميل</a></div>
               <div><label>1080p</label><a href="https://cdn.example/{number}/1080.mp4">تحميل</a></div>
             </div>
           </body></html>"#
    )
}

fn fake_site() -> FakeSite {
    let title = r#"<html><body>
          <h1 class="anime-title">Fake Show</h1>
          <a href="https://anime3rb.com/episode/fake-show/1">1</a>
          <a href="https://anime3rb.com/episode/fake-show/2">2</a>
          <a href="https://anime3rb.com/episode/fake-show/3">3</a>
          <p class="text-lg leading-relaxed">2024</p>
          <p class="text-lg leading-relaxed">3</p>
        </body></html>"#;

    let pages = [
        ("https://anime3rb.com/titles/fake-show".to_string(), title.to_string()),
        ("https://anime3rb.com/episode/fake-show/1".to_string(), episode_page(1)),
        (
            "https://anime3rb.com/episode/fake-show/2".to_string(),
            "<html><body><p>this episode is not available yet</p></body></html>".to_string(),
        ),
        ("https://anime3rb.com/episode/fake-show/3".to_string(), episode_page(3)),
    ];
    FakeSite(pages.into_iter().collect())
}

fn pipeline(dir: &TempDir, cdn: Arc<FakeCdn>) -> Pipeline {
    let client = Anime3rbClient::new("anime3rb.com", Arc::new(fake_site())).expect("client");
    let config = DownloadConfig::new(dir.path()).retry(3, Duration::from_millis(10));
    Pipeline::new(Arc::new(client), cdn, config)
}

#[tokio::test]
async fn episode_without_download_section_is_skipped_others_download() {
    let dir = TempDir::new().expect("tempdir");
    let cdn = Arc::new(FakeCdn::default());
    let pipeline = pipeline(&dir, Arc::clone(&cdn));

    let listing = pipeline
        .client()
        .list_episodes("https://anime3rb.com/titles/fake-show")
        .await
        .expect("episode list");
    assert_eq!(listing.episodes.len(), 3);

    let report = pipeline
        .run_download("https://anime3rb.com/titles/fake-show", &listing.episodes, 2)
        .await
        .expect("run");

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].episode, "2");
    assert_eq!(cdn.opened.load(Ordering::SeqCst), 2);

    let mut files: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read output dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, ["fake-show-ep-1.mp4", "fake-show-ep-3.mp4"]);

    let size = std::fs::metadata(dir.path().join("fake-show-ep-3.mp4"))
        .expect("metadata")
        .len();
    assert_eq!(size, VIDEO_SIZE as u64);
}

#[tokio::test]
async fn final_episode_is_tagged_and_events_are_emitted() {
    let dir = TempDir::new().expect("tempdir");
    let cdn = Arc::new(FakeCdn::default());
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let sink: EventSink = Arc::new(move |event: DownloadEvent| {
        if matches!(event, DownloadEvent::Finished { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let pipeline = pipeline(&dir, cdn).on_event(sink);

    let listing = pipeline.client().list_episodes("fake-show").await.expect("listing");
    let wanted: Vec<_> = listing
        .episodes
        .iter()
        .filter(|e| e.number == "3")
        .cloned()
        .collect();

    let report = pipeline
        .run(RunRequest {
            anime_url: "https://anime3rb.com/titles/fake-show".to_string(),
            episodes: wanted,
            max_concurrency: 1,
            final_episode: listing.final_episode().map(String::from),
        })
        .await
        .expect("run");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.results[0].file_name, "fake-show-ep-3 [END].mp4");
    assert!(dir.path().join("fake-show-ep-3 [END].mp4").exists());
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_with_nothing_resolvable_never_opens_a_download() {
    let dir = TempDir::new().expect("tempdir");
    let cdn = Arc::new(FakeCdn::default());
    let pipeline = pipeline(&dir, Arc::clone(&cdn));

    let episodes = vec![
        EpisodeRef::new("fake-show", "2", "https://anime3rb.com/episode/fake-show/2"),
        EpisodeRef::new("fake-show", "9", "https://anime3rb.com/episode/fake-show/9"),
    ];

    let report = pipeline
        .run_download("fake-show", &episodes, 3)
        .await
        .expect("run");

    assert!(report.is_empty_run());
    assert_eq!(report.skipped.len(), 2);
    assert!(report.summary().contains("nothing to download"));
    assert_eq!(cdn.opened.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("fake-show-ep-2.mp4").exists());
}

#[tokio::test]
async fn intermediate_download_page_is_followed() {
    let dir = TempDir::new().expect("tempdir");
    let download_page = r#"<html><body>
          <div class="flex flex-wrap gap-4 justify-center">
            <div><label>720p</label><a href="/files/1-720.mp4">تحميل</a></div>
          </div>
        </body></html>"#;
    let cdn = Arc::new(FakeCdn {
        pages: HashMap::from([(
            "https://cdn.example/1/1080.mp4".to_string(),
            download_page.to_string(),
        )]),
        ..FakeCdn::default()
    });
    let pipeline = pipeline(&dir, Arc::clone(&cdn));

    let episodes = vec![EpisodeRef::new(
        "fake-show",
        "1",
        "https://anime3rb.com/episode/fake-show/1",
    )];
    let report = pipeline
        .run_download("fake-show", &episodes, 1)
        .await
        .expect("run");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.results[0].attempts, 1);
    assert_eq!(
        *cdn.urls.lock().expect("urls lock"),
        [
            "https://cdn.example/1/1080.mp4",
            "https://cdn.example/files/1-720.mp4"
        ]
    );
    assert!(dir.path().join("fake-show-ep-1.mp4").exists());
}

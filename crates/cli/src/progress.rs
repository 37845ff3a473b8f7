use std::io::Write;
use std::time::{Duration, Instant};

use crossterm::cursor::MoveUp;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use owo_colors::OwoColorize;

use anime3rb_downloader::DownloadEvent;

use crate::utils::*;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const BAR_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowStatus {
    Connecting,
    Downloading,
    Retrying,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
struct EpisodeRow {
    episode: String,
    status: RowStatus,
    attempt: u32,
    downloaded: u64,
    total: Option<u64>,
    started_at: Instant,
    elapsed: Duration,
    note: Option<String>,
}

impl EpisodeRow {
    fn new(episode: &str) -> Self {
        Self {
            episode: episode.to_string(),
            status: RowStatus::Connecting,
            attempt: 1,
            downloaded: 0,
            total: None,
            started_at: Instant::now(),
            elapsed: Duration::ZERO,
            note: None,
        }
    }

    fn is_settled(&self) -> bool {
        matches!(self.status, RowStatus::Done | RowStatus::Failed)
    }

    fn ratio(&self) -> f64 {
        match (self.status, self.total) {
            (RowStatus::Done, _) => 1.0,
            (_, Some(0)) | (_, None) => 0.0,
            (_, Some(total)) => (self.downloaded as f64 / total as f64).clamp(0.0, 1.0),
        }
    }
}

/// one line per episode of the run, redrawn in place.
pub struct DownloadProgressRenderer {
    enabled: bool,
    spinner_step: usize,
    drawn_lines: u16,
    rows: Vec<EpisodeRow>,
}

impl DownloadProgressRenderer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            spinner_step: 0,
            drawn_lines: 0,
            rows: Vec::new(),
        }
    }

    fn row(&mut self, episode: &str) -> &mut EpisodeRow {
        let index = match self.rows.iter().position(|r| r.episode == episode) {
            Some(index) => index,
            None => {
                self.rows.push(EpisodeRow::new(episode));
                self.rows.len() - 1
            }
        };
        &mut self.rows[index]
    }

    pub fn handle(&mut self, event: DownloadEvent) {
        let row = self.row(event.episode());

        match event {
            DownloadEvent::Started {
                attempt,
                total_bytes,
                ..
            } => {
                row.status = RowStatus::Downloading;
                row.attempt = attempt;
                row.total = total_bytes;
                row.downloaded = 0;
                row.started_at = Instant::now();
                row.elapsed = Duration::ZERO;
                row.note = None;
            }
            DownloadEvent::Progress {
                downloaded_bytes,
                total_bytes,
                elapsed,
                ..
            } => {
                row.status = RowStatus::Downloading;
                row.downloaded = downloaded_bytes;
                row.total = total_bytes;
                row.started_at = Instant::now().checked_sub(elapsed).unwrap_or_else(Instant::now);
                row.elapsed = elapsed;
            }
            DownloadEvent::Retrying {
                attempt,
                reason,
                delay,
                ..
            } => {
                row.status = RowStatus::Retrying;
                row.attempt = attempt;
                row.note = Some(format!("retry in {}s: {reason}", delay.as_secs()));
            }
            DownloadEvent::Finished {
                downloaded_bytes,
                elapsed,
                ..
            } => {
                row.status = RowStatus::Done;
                row.downloaded = downloaded_bytes;
                row.total = Some(downloaded_bytes);
                row.elapsed = elapsed;
                row.note = None;
            }
            DownloadEvent::Failed { reason, .. } => {
                row.status = RowStatus::Failed;
                row.note = Some(reason);
            }
        }

        self.draw();
    }

    /// redraws running rows so speed and spinner keep moving between events.
    pub fn tick(&mut self) {
        if self.rows.iter().any(|r| !r.is_settled()) {
            for row in self.rows.iter_mut().filter(|r| r.status == RowStatus::Downloading) {
                row.elapsed = row.started_at.elapsed();
            }
            self.draw();
        }
    }

    /// leaves the last frame on screen; later output starts below it.
    pub fn finish(&mut self) {
        self.draw();
        self.drawn_lines = 0;
    }

    fn draw(&mut self) {
        if !self.enabled || self.rows.is_empty() {
            return;
        }

        let frame = FRAMES[self.spinner_step % FRAMES.len()];
        self.spinner_step = self.spinner_step.wrapping_add(1);

        let mut stdout = std::io::stdout();
        if self.drawn_lines > 0 {
            let _ = execute!(stdout, MoveUp(self.drawn_lines), Clear(ClearType::FromCursorDown));
        }
        for row in &self.rows {
            let _ = writeln!(stdout, "{}", render_row(row, frame));
        }
        let _ = stdout.flush();
        self.drawn_lines = u16::try_from(self.rows.len()).unwrap_or(u16::MAX);
    }
}

fn render_row(row: &EpisodeRow, frame: &str) -> String {
    let icon = match row.status {
        RowStatus::Done => "✓".green().to_string(),
        RowStatus::Failed => "✗".red().to_string(),
        RowStatus::Retrying => "↻".yellow().to_string(),
        _ => frame.cyan().to_string(),
    };
    let label = format!("ep {:<5}", row.episode);

    if let (RowStatus::Failed, Some(note)) = (row.status, &row.note) {
        return format!("{icon} {label} {}", note.red());
    }

    let filled = (row.ratio() * BAR_WIDTH as f64).round() as usize;
    let bar = format!(
        "[{}{}]",
        "█".repeat(filled),
        " ".repeat(BAR_WIDTH.saturating_sub(filled))
    );
    let percent = format!("{:>5.1}%", row.ratio() * 100.0);
    let size = format!(
        "{} / {}",
        format_bytes(row.downloaded as f64),
        row.total
            .map(|t| format_bytes(t as f64))
            .unwrap_or_else(|| "unknown".to_string())
    );

    let tail = match row.status {
        RowStatus::Connecting => "connecting".dimmed().to_string(),
        RowStatus::Retrying => row.note.clone().unwrap_or_default().yellow().to_string(),
        RowStatus::Done => format!("done in {}", format_duration(row.elapsed)),
        _ => {
            let eta = row
                .total
                .and_then(|t| estimate_eta(row.downloaded, t, row.elapsed))
                .map(format_duration)
                .unwrap_or_else(|| "--:--".to_string());
            format!(
                "{} eta {} (attempt {})",
                format_speed(row.downloaded, row.elapsed).cyan(),
                eta.magenta(),
                row.attempt
            )
        }
    };

    format!("{icon} {label} {} {percent} {:>23} {tail}", bar.green(), size.yellow())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(episode: &str, downloaded: u64, total: u64) -> DownloadEvent {
        DownloadEvent::Progress {
            episode: episode.into(),
            downloaded_bytes: downloaded,
            total_bytes: Some(total),
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn keeps_one_row_per_episode_in_arrival_order() {
        let mut renderer = DownloadProgressRenderer::new(false);
        renderer.handle(progress("2", 10, 100));
        renderer.handle(progress("1", 10, 100));
        renderer.handle(progress("2", 50, 100));

        let episodes: Vec<_> = renderer.rows.iter().map(|r| r.episode.as_str()).collect();
        assert_eq!(episodes, ["2", "1"]);
        assert_eq!(renderer.rows[0].ratio(), 0.5);
    }

    #[test]
    fn settled_rows_report_outcome() {
        let mut renderer = DownloadProgressRenderer::new(false);
        renderer.handle(DownloadEvent::Finished {
            episode: "1".into(),
            downloaded_bytes: 4096,
            elapsed: Duration::from_secs(4),
        });
        renderer.handle(DownloadEvent::Failed {
            episode: "2".into(),
            reason: "failed after 3 attempt(s): timeout".into(),
        });

        assert!(renderer.rows.iter().all(EpisodeRow::is_settled));
        assert_eq!(renderer.rows[0].ratio(), 1.0);
        assert!(render_row(&renderer.rows[1], "x").contains("failed after 3 attempt(s)"));
        assert!(render_row(&renderer.rows[0], "x").contains("done in 00:04"));
    }
}

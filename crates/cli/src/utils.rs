use std::time::Duration;

use anyhow::{Result, bail};

use crate::constants::*;

pub fn estimate_eta(downloaded: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if downloaded == 0 || total <= downloaded || elapsed.is_zero() {
        return None;
    }

    let speed = downloaded as f64 / elapsed.as_secs_f64();
    let remaining = (total - downloaded) as f64 / speed;
    remaining
        .is_finite()
        .then(|| Duration::from_secs_f64(remaining.max(0.0)))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs / 3600 {
        0 => format!("{:02}:{:02}", secs / 60, secs % 60),
        hours => format!("{hours}:{:02}:{:02}", (secs % 3600) / 60, secs % 60),
    }
}

/// human size with binary units, e.g. `12.40 MB`.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0usize;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

pub fn format_speed(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let bps = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
    format!("{}/s", format_bytes(bps))
}

/// canonical title url for any anime3rb title link, episode link or bare slug.
pub fn normalize_series_link(raw: &str) -> Result<String> {
    let input = raw.trim();

    let slug = TITLE_LINK_RE
        .captures(input)
        .or_else(|| EPISODE_LINK_RE.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .or_else(|| SLUG_RE.is_match(input).then_some(input));

    match slug {
        Some(slug) => Ok(format!("https://{ANIME3RB_DOMAIN}/titles/{slug}")),
        None => bail!(
            "invalid --series value: expected an anime3rb /titles/<slug> or /episode/<slug>/<n> link, or a bare slug"
        ),
    }
}

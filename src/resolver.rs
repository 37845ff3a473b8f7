use reqwest::Url;
use tracing::debug;

use crate::models::{DownloadOption, QualityTier};
use crate::parser::parse_download_options;

/// tiers in preference order. compact-codec variants never qualify.
const PREFERENCE: [QualityTier; 3] = [
    QualityTier::FullHd1080,
    QualityTier::Hd720,
    QualityTier::Sd480,
];

/// the best option: 1080p, else 720p, else 480p. within a tier the first
/// option in document order wins.
pub fn select_best(options: &[DownloadOption]) -> Option<&DownloadOption> {
    PREFERENCE
        .iter()
        .find_map(|tier| options.iter().find(|option| option.quality == *tier))
}

/// the single download option to use for an episode page, if any qualifies.
pub fn resolve(episode_page_html: &str, page_url: &Url) -> Option<DownloadOption> {
    let options = parse_download_options(episode_page_html, page_url);
    let best = select_best(&options).cloned();

    match &best {
        Some(option) => debug!(quality = %option.quality, url = %option.url, "resolved download option"),
        None => debug!(offered = options.len(), "no acceptable download option"),
    }

    best
}

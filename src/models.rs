use std::cmp::Ordering;

use serde::Serialize;

/// catalog entry parsed from a listing, search result or detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimeSummary {
    pub title: String,
    /// canonical title page url.
    pub url: String,
    /// last path segment of `url`; identifies the anime.
    pub slug: String,
    pub alt_titles: Vec<String>,
    pub cover_url: Option<String>,
    pub synopsis: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub year: Option<u16>,
    pub episode_count: Option<u32>,
}

/// one episode page of an anime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EpisodeRef {
    pub anime_slug: String,
    /// identifier as it appears in the episode url; usually numeric.
    pub number: String,
    pub url: String,
}

impl EpisodeRef {
    pub fn new(
        anime_slug: impl Into<String>,
        number: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            anime_slug: anime_slug.into(),
            number: number.into(),
            url: url.into(),
        }
    }

    /// numeric value of the identifier, `None` for specials like `"ova"`.
    pub fn numeric(&self) -> Option<f64> {
        self.number
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

/// ascending by numeric identifier; non-numeric identifiers go last.
///
/// two non-numeric identifiers compare equal, so a stable sort keeps them in
/// discovery order.
pub fn episode_order(a: &EpisodeRef, b: &EpisodeRef) -> Ordering {
    match (a.numeric(), b.numeric()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_episodes(episodes: &mut [EpisodeRef]) {
    episodes.sort_by(episode_order);
}

/// nominal quality of a download option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QualityTier {
    Sd480,
    Hd720,
    FullHd1080,
    /// bandwidth-efficient codec variant (hevc/x265), with its nominal resolution.
    Compact(Option<u32>),
    /// a labeled control whose resolution could not be recognised.
    Other,
}

impl QualityTier {
    pub fn resolution(&self) -> Option<u32> {
        match self {
            Self::Sd480 => Some(480),
            Self::Hd720 => Some(720),
            Self::FullHd1080 => Some(1080),
            Self::Compact(resolution) => *resolution,
            Self::Other => None,
        }
    }

    pub fn is_compact(&self) -> bool {
        matches!(self, Self::Compact(_))
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compact(Some(r)) => write!(f, "{r}p (hevc)"),
            Self::Compact(None) => write!(f, "hevc"),
            Self::Other => write!(f, "unknown"),
            tier => write!(f, "{}p", tier.resolution().unwrap_or_default()),
        }
    }
}

/// a quality control found on an episode page and the url it points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadOption {
    pub quality: QualityTier,
    /// label text as shown on the page.
    pub label: String,
    pub url: String,
}

/// one page of a paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next: bool,
}

/// episodes of one anime plus the count the title page declares.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeListing {
    pub anime_slug: String,
    pub episodes: Vec<EpisodeRef>,
    pub declared_count: Option<u32>,
}

impl EpisodeListing {
    /// identifier of the series' last episode, when the listing is complete.
    ///
    /// specials sort after numbered episodes, so the last numbered one is
    /// compared against the declared count.
    pub fn final_episode(&self) -> Option<&str> {
        let count = self.declared_count?;
        let (last, n) = self
            .episodes
            .iter()
            .rev()
            .find_map(|e| e.numeric().map(|n| (e, n)))?;
        (n >= f64::from(count)).then_some(last.number.as_str())
    }
}

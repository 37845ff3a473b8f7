//! pure functions from page html to catalog values.
//!
//! missing structure is never an error here: a malformed card is skipped and
//! logged, an absent section yields an empty collection. relative links are
//! resolved against `page_url`, the address the html was served from.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::markup::{MARKUP, absolute, clean_text, parent_element};
use crate::models::{AnimeSummary, DownloadOption, EpisodeRef, QualityTier, sort_episodes};

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(480|720|1080)(?:\D|$)").expect("invalid regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("invalid regex"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("invalid regex"));

/// label fragments marking the bandwidth-efficient codec variant.
pub const COMPACT_MARKERS: &[&str] = &["hevc", "x265", "h265", "h.265", "مضغوط"];

const STATUS_LABELS: &[&str] = &["status", "الحالة"];
const GENRE_LABELS: &[&str] = &["genres", "التصنيفات", "النوع"];
const RELEASED_LABELS: &[&str] = &["released", "سنة الإصدار", "تاريخ الإصدار"];
const ALT_TITLE_LABELS: &[&str] = &["alternative titles", "أسماء أخرى"];

/// anime cards of a catalog listing page (`div.anime-card`).
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<AnimeSummary> {
    let doc = Html::parse_document(html);
    let mut items = Vec::new();

    for (index, card) in MARKUP.anime_card.all(doc.root_element()).enumerate() {
        match parse_listing_card(card, page_url) {
            Some(anime) => items.push(anime),
            None => warn!(index, "skipping malformed anime card"),
        }
    }

    debug!(count = items.len(), "parsed listing");
    items
}

fn parse_listing_card(card: ElementRef<'_>, base: &Url) -> Option<AnimeSummary> {
    let link = MARKUP.card_title_link.first(card)?;
    let title = clean_text(link)?;
    let url = absolute(base, link.value().attr("href")?)?;
    let slug = slug_from_url(&url)?;
    let cover_url = MARKUP
        .card_cover
        .attr(card, "src")
        .and_then(|src| absolute(base, &src));

    Some(AnimeSummary {
        title,
        url,
        slug,
        alt_titles: Vec::new(),
        cover_url,
        synopsis: None,
        status: None,
        genres: Vec::new(),
        rating: None,
        year: None,
        episode_count: None,
    })
}

/// title cards of a search result page (`a.simple-title-card`).
///
/// the first badge is the score, the second the episode count.
pub fn parse_search_results(html: &str, page_url: &Url) -> Vec<AnimeSummary> {
    let doc = Html::parse_document(html);
    let mut items = Vec::new();

    for (index, card) in MARKUP.title_card.all(doc.root_element()).enumerate() {
        match parse_title_card(card, page_url) {
            Some(anime) => items.push(anime),
            None => warn!(index, "skipping malformed search result card"),
        }
    }

    debug!(count = items.len(), "parsed search results");
    items
}

fn parse_title_card(card: ElementRef<'_>, base: &Url) -> Option<AnimeSummary> {
    let url = absolute(base, card.value().attr("href")?)?;
    let title = MARKUP.title_card_name.text(card)?;
    let slug = slug_from_url(&url)?;
    let alt_titles = MARKUP.title_card_subtitle.text(card).into_iter().collect();
    let cover_url = MARKUP
        .title_card_image
        .attr(card, "src")
        .or_else(|| MARKUP.title_card_image.attr(card, "data-src"))
        .and_then(|src| absolute(base, &src));

    let badges = MARKUP.title_card_badge.texts(card);
    let rating = badges.first().and_then(|b| first_number(b));
    let episode_count = badges
        .get(1)
        .and_then(|b| first_number(b))
        .map(|n| n as u32);

    Some(AnimeSummary {
        title,
        url,
        slug,
        alt_titles,
        cover_url,
        synopsis: None,
        status: None,
        genres: Vec::new(),
        rating: rating.map(|r| r as f32),
        year: None,
        episode_count,
    })
}

/// a title (detail) page. `page_url` stands in when the page declares no
/// canonical url. `None` when the page has no title.
pub fn parse_detail(html: &str, page_url: &Url) -> Option<AnimeSummary> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let Some(title) = MARKUP.detail_title.text(root) else {
        warn!(url = %page_url, "title page has no title");
        return None;
    };

    let url = MARKUP
        .canonical_link
        .attr(root, "href")
        .or_else(|| MARKUP.og_url.attr(root, "content"))
        .and_then(|href| absolute(page_url, &href))
        .unwrap_or_else(|| page_url.to_string());
    let slug = slug_from_url(&url)?;

    let mut anime = AnimeSummary {
        title,
        slug,
        cover_url: MARKUP
            .detail_cover
            .attr(root, "src")
            .and_then(|src| absolute(page_url, &src)),
        synopsis: MARKUP.synopsis.text(root),
        rating: MARKUP
            .rating
            .text(root)
            .and_then(|r| first_number(&r))
            .map(|r| r as f32),
        episode_count: episode_count_in(root),
        url,
        alt_titles: Vec::new(),
        status: None,
        genres: Vec::new(),
        year: None,
    };

    for row in MARKUP.info_row.all(root) {
        let Some(label) = clean_text(row).map(|t| t.to_lowercase()) else {
            continue;
        };
        let is = |labels: &[&str]| labels.iter().any(|l| label.contains(l));

        if is(ALT_TITLE_LABELS) {
            anime.alt_titles = MARKUP.info_value.texts(row);
        } else if is(GENRE_LABELS) {
            anime.genres = MARKUP.info_link.texts(row);
        } else if is(STATUS_LABELS) {
            anime.status = MARKUP.info_value.text(row);
        } else if is(RELEASED_LABELS) {
            anime.year = YEAR_RE
                .find(&label)
                .and_then(|m| m.as_str().parse::<u16>().ok());
        }
    }

    Some(anime)
}

/// episode links of `anime_id` found on a page, deduplicated and sorted.
///
/// only anchors shaped `/episode/<anime_id>/<n>` count. numeric identifiers
/// sort ascending; anything else is kept after them in discovery order.
pub fn parse_episode_list(html: &str, anime_id: &str, page_url: &Url) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut episodes = Vec::new();

    for anchor in MARKUP.link.all(doc.root_element()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(mut url) = page_url.join(href.trim()).ok() else {
            continue;
        };
        url.set_query(None);
        url.set_fragment(None);

        let Some(segments) = url.path_segments() else {
            continue;
        };
        let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
        let [kind, slug, number] = segments.as_slice() else {
            continue;
        };
        if *kind != "episode" || *slug != anime_id {
            continue;
        }

        let number = number.to_string();
        if seen.insert(number.clone()) {
            episodes.push(EpisodeRef::new(anime_id, number, url.to_string()));
        }
    }

    sort_episodes(&mut episodes);
    debug!(anime = anime_id, count = episodes.len(), "parsed episode list");
    episodes
}

/// every labeled quality control inside the page's download section.
///
/// the url of a control is the first link in its parent element, or its
/// grandparent when the parent has none. controls without a link are dropped.
pub fn parse_download_options(html: &str, page_url: &Url) -> Vec<DownloadOption> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let Some(container) = MARKUP
        .download_containers
        .iter()
        .find_map(|pattern| pattern.first(root))
    else {
        warn!("page has no download section");
        return Vec::new();
    };

    let mut options = Vec::new();
    for label in MARKUP.quality_label.all(container) {
        let Some(text) = clean_text(label) else {
            continue;
        };

        // the container itself never counts as a grandparent: its first link
        // belongs to another control
        let parent = parent_element(label);
        let href = parent
            .and_then(|p| MARKUP.link.attr(p, "href"))
            .or_else(|| {
                parent
                    .and_then(parent_element)
                    .filter(|g| g.id() != container.id())
                    .and_then(|g| MARKUP.link.attr(g, "href"))
            });

        match href.and_then(|h| absolute(page_url, &h)) {
            Some(url) => options.push(DownloadOption {
                quality: classify_quality(&text),
                label: text,
                url,
            }),
            None => warn!(label = %text, "quality label has no associated link"),
        }
    }

    options
}

/// tier named by a quality label; codec markers win over the resolution.
pub fn classify_quality(label: &str) -> QualityTier {
    let lower = label.to_lowercase();
    let resolution = RESOLUTION_RE
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    if COMPACT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return QualityTier::Compact(resolution);
    }

    match resolution {
        Some(1080) => QualityTier::FullHd1080,
        Some(720) => QualityTier::Hd720,
        Some(480) => QualityTier::Sd480,
        _ => QualityTier::Other,
    }
}

/// the episode count a title page declares.
pub fn parse_episode_count(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    episode_count_in(doc.root_element())
}

/// the count sits in the second `p.text-lg.leading-relaxed` of the page.
fn episode_count_in(root: ElementRef<'_>) -> Option<u32> {
    let text = MARKUP
        .episode_count_paragraph
        .all(root)
        .nth(1)
        .and_then(clean_text)?;
    NUMBER_RE.find(&text)?.as_str().parse::<u32>().ok()
}

pub fn parse_genres(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    MARKUP
        .genre_link
        .texts(doc.root_element())
        .into_iter()
        .filter(|g| seen.insert(g.clone()))
        .collect()
}

/// whether a listing page links to a following page.
pub fn parse_has_next(html: &str) -> bool {
    let doc = Html::parse_document(html);
    MARKUP.next_page.exists(doc.root_element())
}

/// last non-empty path segment of a url.
pub fn slug_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .map(String::from)
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER_RE.find(text)?.as_str().parse::<f64>().ok()
}

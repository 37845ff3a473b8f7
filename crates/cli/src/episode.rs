use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use anime3rb::{Anime3rbBuilder, Anime3rbClient, AnimeSummary, EpisodeListing, EpisodeRef};

use crate::args::*;
use crate::logger::*;
use crate::prompt::*;
use crate::utils::*;

/// everything a run needs once the series and its episodes are known.
pub struct EpisodeSelection {
    pub client: Arc<Anime3rbClient>,
    pub series_url: String,
    pub anime: Option<AnimeSummary>,
    pub listing: EpisodeListing,
    pub episodes: Vec<EpisodeRef>,
}

impl EpisodeSelection {
    pub fn title(&self) -> &str {
        self.anime
            .as_ref()
            .map(|a| a.title.as_str())
            .unwrap_or(&self.listing.anime_slug)
    }
}

pub fn build_client(site: &SiteArgs) -> Result<Anime3rbClient> {
    let mut builder = Anime3rbBuilder::new()
        .timeout(Duration::from_secs(site.timeout.max(1)))
        .rate_limit(Duration::from_millis(site.rate_limit_ms));
    if let Some(cookies) = &site.cookies {
        builder = builder.cookies_str(cookies);
    }
    Ok(builder.build()?)
}

/// the canonical title url, prompting when missing or in interactive mode.
pub fn series_url(series: Option<&str>, interactive: bool) -> Result<String> {
    let raw = match series {
        Some(series) if !interactive => series.to_string(),
        series => prompt_for_series(series)?,
    };
    normalize_series_link(&raw)
}

/// finds the series, its episode list, and the episodes the user asked for.
///
/// fails when the episode list cannot be determined; nothing has been
/// downloaded at that point.
pub async fn select_episodes(args: &ResolveArgs, logger: &CliLogger) -> Result<EpisodeSelection> {
    let series_url = series_url(args.series.as_deref(), args.app_args.interactive)?;

    logger.debug("episode", format!("series: {series_url}"));
    let client = Arc::new(build_client(&args.site)?);

    let anime = match logger
        .while_loading(
            format!("getting info from: {}", series_url.yellow()),
            client.get_anime(&series_url),
        )
        .await
    {
        Ok(anime) => {
            logger.success(format!("title: {}", anime.title.trim().yellow()));
            Some(anime)
        }
        Err(err) => {
            logger.warn(format!("could not read series details: {err}"));
            None
        }
    };

    let listing = logger
        .while_loading("retrieving episode list", client.list_episodes(&series_url))
        .await?;
    let total = listing.episodes.len();
    logger.success(format!(
        "episodes: {}{}",
        total.yellow(),
        match listing.declared_count {
            Some(count) if count as usize != total => format!(" (page declares {count})"),
            _ => String::new(),
        }
    ));

    let range = match args.episodes {
        Some(range) if !args.app_args.interactive => range,
        _ => prompt_for_episodes(total)?,
    };
    let episodes = pick(&listing, range)?;
    logger.debug(
        "episode",
        format!("selected {} episode(s) from range {range}", episodes.len()),
    );

    Ok(EpisodeSelection {
        client,
        series_url,
        anime,
        listing,
        episodes,
    })
}

/// the episodes at 1-indexed positions `range` of the listing.
pub fn pick(listing: &EpisodeListing, range: EpisodeRange) -> Result<Vec<EpisodeRef>> {
    let total = listing.episodes.len();
    if total == 0 {
        bail!("{} has no episodes", listing.anime_slug);
    }

    match range {
        EpisodeRange::All => Ok(listing.episodes.clone()),
        EpisodeRange::Range { start, end } if start >= 1 && end <= total && start <= end => {
            Ok(listing.episodes[start - 1..end].to_vec())
        }
        EpisodeRange::Range { .. } => {
            bail!("episode range {range} is outside of the available 1-{total}")
        }
    }
}

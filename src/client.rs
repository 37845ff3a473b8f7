use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Url;
use tracing::{debug, info};

use anime3rb_core::Fetch;

use crate::errors::{Anime3rbError, Result};
use crate::models::{AnimeSummary, DownloadOption, EpisodeListing, EpisodeRef, Page};
use crate::parser;
use crate::resolver;

static ANIME_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:titles|episode)/([^/?#]+)").expect("invalid anime slug regex")
});

/// catalog and episode access for one anime3rb mirror.
pub struct Anime3rbClient {
    base: Url,
    fetcher: Arc<dyn Fetch>,
}

impl Anime3rbClient {
    /// client for `https://{base_domain}/` reading pages through `fetcher`.
    pub fn new(base_domain: &str, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let base = Url::parse(&format!("https://{base_domain}/")).map_err(|_| {
            Anime3rbError::BaseUrl {
                base: base_domain.to_string(),
            }
        })?;
        Ok(Self { base, fetcher })
    }

    /// `link` resolved against the mirror root; absolute links pass through.
    fn locate(&self, link: &str) -> Result<Url> {
        self.base
            .join(link.trim())
            .map_err(|_| Anime3rbError::InvalidUrl {
                url: link.to_string(),
            })
    }

    fn title_url(&self, slug: &str) -> Result<Url> {
        self.locate(&format!("titles/{slug}"))
    }

    fn episode_url(&self, slug: &str, number: &str) -> Result<Url> {
        self.locate(&format!("episode/{slug}/{number}"))
    }

    /// slug of a title or episode link; a bare slug is returned unchanged.
    pub fn anime_slug(link: &str) -> Result<String> {
        let link = link.trim();
        if !link.is_empty() && !link.contains('/') {
            return Ok(link.to_string());
        }

        ANIME_SLUG_RE
            .captures(link)
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
            .ok_or_else(|| Anime3rbError::InvalidAnimeLink {
                link: link.to_string(),
            })
    }

    async fn page(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching page");
        Ok(self.fetcher.fetch(url.as_str()).await?)
    }

    /// title cards matching `query` on the site search page.
    pub async fn search(&self, query: &str) -> Result<Vec<AnimeSummary>> {
        let mut url = self.locate("search")?;
        url.query_pairs_mut().append_pair("q", query.trim());

        let html = self.page(&url).await?;
        let results = parser::parse_search_results(&html, &url);
        info!(query, count = results.len(), "search finished");
        Ok(results)
    }

    /// one page of the catalog, optionally restricted to a genre.
    pub async fn list_anime(&self, page: u32, genre: Option<&str>) -> Result<Page<AnimeSummary>> {
        let page = page.max(1);
        let path = match (genre, page) {
            (None, 1) => String::new(),
            (None, n) => format!("page/{n}/"),
            (Some(g), 1) => format!("genre/{g}/"),
            (Some(g), n) => format!("genre/{g}/page/{n}/"),
        };

        let url = self.locate(&path)?;
        let html = self.page(&url).await?;
        Ok(Page {
            items: parser::parse_listing(&html, &url),
            page,
            has_next: parser::parse_has_next(&html),
        })
    }

    pub async fn list_genres(&self) -> Result<Vec<String>> {
        let html = self.page(&self.base).await?;
        Ok(parser::parse_genres(&html))
    }

    /// detail page of an anime given its slug or any of its links.
    pub async fn get_anime(&self, slug_or_url: &str) -> Result<AnimeSummary> {
        let slug = Self::anime_slug(slug_or_url)?;
        let url = self.title_url(&slug)?;
        let html = self.page(&url).await?;
        parser::parse_detail(&html, &url).ok_or_else(|| Anime3rbError::AnimeNotFound {
            url: url.to_string(),
        })
    }

    /// every episode of an anime, read from its title page.
    ///
    /// when the page links no episodes but declares a count, episode urls are
    /// built as `/episode/<slug>/<n>` for `n` in `1..=count`. a page with
    /// neither is [`Anime3rbError::EpisodeListUnavailable`].
    pub async fn list_episodes(&self, slug_or_url: &str) -> Result<EpisodeListing> {
        let slug = Self::anime_slug(slug_or_url)?;
        let url = self.title_url(&slug)?;
        let html = self.page(&url).await?;

        let declared_count = parser::parse_episode_count(&html);
        let mut episodes = parser::parse_episode_list(&html, &slug, &url);

        if episodes.is_empty() {
            match declared_count {
                Some(count) if count > 0 => {
                    debug!(%slug, count, "no episode links; building urls from the declared count");
                    episodes = (1..=count)
                        .map(|n| {
                            let number = n.to_string();
                            let episode_url = self.episode_url(&slug, &number)?;
                            Ok(EpisodeRef::new(slug.as_str(), number, episode_url))
                        })
                        .collect::<Result<_>>()?;
                }
                _ => {
                    return Err(Anime3rbError::EpisodeListUnavailable {
                        url: url.to_string(),
                    });
                }
            }
        }

        info!(%slug, episodes = episodes.len(), ?declared_count, "episode list ready");
        Ok(EpisodeListing {
            anime_slug: slug,
            episodes,
            declared_count,
        })
    }

    /// every labeled quality on an episode page, in document order.
    pub async fn fetch_download_options(&self, episode_url: &str) -> Result<Vec<DownloadOption>> {
        let url = self.locate(episode_url)?;
        let html = self.page(&url).await?;
        Ok(parser::parse_download_options(&html, &url))
    }

    /// best download option of an episode page; `Ok(None)` when none qualifies.
    pub async fn resolve_episode(&self, episode_url: &str) -> Result<Option<DownloadOption>> {
        let url = self.locate(episode_url)?;
        let html = self.page(&url).await?;
        Ok(resolver::resolve(&html, &url))
    }
}

use std::sync::LazyLock;

use regex::Regex;

pub const ANIME3RB_DOMAIN: &str = "anime3rb.com";

pub static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("slug regex must compile"));

pub static TITLE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        format!(
            r"^https?://(?:www\.)?{}/titles/([\w-]+)(?:[/?#].*)?$",
            regex::escape(ANIME3RB_DOMAIN)
        )
        .as_str(),
    )
    .expect("title link regex must compile")
});

pub static EPISODE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        format!(
            r"^https?://(?:www\.)?{}/episode/([\w-]+)/[^/?#]+(?:[/?#].*)?$",
            regex::escape(ANIME3RB_DOMAIN)
        )
        .as_str(),
    )
    .expect("episode link regex must compile")
});

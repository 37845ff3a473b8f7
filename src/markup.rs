//! site markup, isolated behind typed patterns.
//!
//! every css selector and class name the scraper depends on lives here; the
//! parser only asks for "the title of this card" or "the download container".

use std::sync::LazyLock;

use reqwest::Url;
use scraper::element_ref::Select;
use scraper::{ElementRef, Selector};

/// a compiled structural pattern plus the css it came from.
#[derive(Debug)]
pub struct Pattern {
    css: &'static str,
    selector: Selector,
}

impl Pattern {
    /// only ever called with literals from [`SiteMarkup`], inside a `LazyLock`.
    fn new(css: &'static str) -> Self {
        let selector = Selector::parse(css).expect("invalid selector in site markup");
        Self { css, selector }
    }

    pub fn css(&self) -> &'static str {
        self.css
    }

    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        scope.select(&self.selector).next()
    }

    pub fn all<'a, 'b>(&'b self, scope: ElementRef<'a>) -> Select<'a, 'b> {
        scope.select(&self.selector)
    }

    pub fn exists(&self, scope: ElementRef<'_>) -> bool {
        self.first(scope).is_some()
    }

    /// trimmed text of the first match; `None` when missing or blank.
    pub fn text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.first(scope).and_then(clean_text)
    }

    /// trimmed texts of every non-blank match, in document order.
    pub fn texts(&self, scope: ElementRef<'_>) -> Vec<String> {
        self.all(scope).filter_map(clean_text).collect()
    }

    pub fn attr(&self, scope: ElementRef<'_>, name: &str) -> Option<String> {
        self.first(scope)
            .and_then(|el| el.value().attr(name))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }
}

/// every pattern the site's pages are read with.
#[derive(Debug)]
pub struct SiteMarkup {
    pub anime_card: Pattern,
    pub card_title_link: Pattern,
    pub card_cover: Pattern,

    pub title_card: Pattern,
    pub title_card_name: Pattern,
    pub title_card_subtitle: Pattern,
    pub title_card_image: Pattern,
    pub title_card_badge: Pattern,

    pub detail_title: Pattern,
    pub canonical_link: Pattern,
    pub og_url: Pattern,
    pub detail_cover: Pattern,
    pub synopsis: Pattern,
    pub info_row: Pattern,
    pub info_value: Pattern,
    pub info_link: Pattern,
    pub rating: Pattern,
    pub episode_count_paragraph: Pattern,

    pub link: Pattern,
    /// tried in order; the first one present on the page wins.
    pub download_containers: Vec<Pattern>,
    pub quality_label: Pattern,

    pub genre_link: Pattern,
    pub next_page: Pattern,
}

pub static MARKUP: LazyLock<SiteMarkup> = LazyLock::new(|| SiteMarkup {
    anime_card: Pattern::new("div.anime-card"),
    card_title_link: Pattern::new("h3.anime-title a"),
    card_cover: Pattern::new("img.anime-cover"),

    title_card: Pattern::new("a.simple-title-card"),
    title_card_name: Pattern::new("div.details h4"),
    title_card_subtitle: Pattern::new("div.details h5"),
    title_card_image: Pattern::new("img"),
    title_card_badge: Pattern::new("div.details span.badge"),

    detail_title: Pattern::new("h1.anime-title"),
    canonical_link: Pattern::new(r#"link[rel="canonical"]"#),
    og_url: Pattern::new(r#"meta[property="og:url"]"#),
    detail_cover: Pattern::new("img.anime-cover"),
    synopsis: Pattern::new("div.anime-synopsis p"),
    info_row: Pattern::new("ul.anime-info li"),
    info_value: Pattern::new("span"),
    info_link: Pattern::new("a"),
    rating: Pattern::new("span.anime-rating"),
    episode_count_paragraph: Pattern::new("p.text-lg.leading-relaxed"),

    link: Pattern::new("a[href]"),
    download_containers: vec![
        Pattern::new("div.flex-grow.flex.flex-wrap.gap-4.justify-center"),
        Pattern::new("div.flex.flex-wrap.gap-4.justify-center"),
        Pattern::new("div.flex-grow.flex-wrap.gap-4.justify-center"),
    ],
    quality_label: Pattern::new("label"),

    genre_link: Pattern::new("ul.genres-list li a"),
    next_page: Pattern::new(r#"a.next-page, a[rel="next"]"#),
});

/// collapses inner whitespace and drops blank text.
pub fn clean_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// resolves `href` against `base`; `None` for javascript/anchor-only links.
pub fn absolute(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// the nearest ancestor of `el` that is an element, skipping text nodes.
pub fn parent_element<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors().find_map(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn every_pattern_compiles() {
        let markup = &*MARKUP;
        assert_eq!(markup.anime_card.css(), "div.anime-card");
        assert_eq!(markup.download_containers.len(), 3);
    }

    #[test]
    fn absolute_resolves_relative_links_and_skips_anchors() {
        let base = Url::parse("https://anime3rb.com/episode/show/1").expect("url");
        assert_eq!(
            absolute(&base, "/titles/one-piece").as_deref(),
            Some("https://anime3rb.com/titles/one-piece")
        );
        assert_eq!(
            absolute(&base, "https://cdn.example/v.mp4").as_deref(),
            Some("https://cdn.example/v.mp4")
        );
        assert_eq!(absolute(&base, "#top"), None);
        assert_eq!(absolute(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div><h1 class=\"anime-title\">\n  One\n   Piece </h1></div>");
        assert_eq!(
            MARKUP.detail_title.text(doc.root_element()).as_deref(),
            Some("One Piece")
        );
    }
}

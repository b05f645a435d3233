//! Article metadata extraction from a journal table-of-contents page.
//!
//! Publisher markup changes often, so every field is described by an ordered
//! list of strategies. The first strategy that produces a non-empty value
//! wins; a field nothing matches stays an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::loader::{DocumentLoader, Source};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Article {
    pub title: String,
    pub authors: String,
    pub date: String,
    pub doi: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

pub const ARTICLE_COLUMNS: [&str; 5] = ["title", "authors", "date", "doi", "abstract"];

/// How text is pulled out of a matched element
#[derive(Debug, Clone, Copy)]
enum TextMode {
    /// Text nodes joined by spaces, whitespace collapsed
    Spaced,
    /// Text nodes joined by ", " (one per contributor)
    Listed,
    /// Spaced, then abstract toggles and labels removed
    Abstract,
}

enum Strategy {
    Select(Selector, TextMode),
    /// "First published online November 16, 2024" anywhere in the container
    FirstPublished,
    /// First link pointing at a DOI, canonicalized
    DoiLink,
}

fn select_all(selectors: &[&str], mode: TextMode) -> Vec<Strategy> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|s| Strategy::Select(s, mode))
        .collect()
}

static CONTAINER_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    [
        "div.issue-item",
        "div.issue-item-container",
        "div.article-list-item",
        "article.item",
        "div.hlFld-Fulltext",
        "div.tocHeading",
        "div.art_title",
        r#"div[class*="issue-item"]"#,
        r#"div[class*="article"]"#,
        "li.item",
        "div.item",
    ]
    .into_iter()
    .filter_map(|s| Selector::parse(s).ok().map(|sel| (s, sel)))
    .collect()
});

static TITLE_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    select_all(
        &[
            "h3.item-title", "h4.item-title", "h5.item-title", "div.art_title",
            "div.hlFld-Title", "a.ref.nowrap", ".tocHeading",
            "h3", "h4", "h5", "h2", r#"[class*="title"]"#,
        ],
        TextMode::Spaced,
    )
});

static AUTHOR_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    select_all(
        &[
            "div.contrib", "div.contributors", "div.author", "div.authors",
            "span.hlFld-ContribAuthor", "div.art_authors",
            r#"[class*="contrib"]"#, r#"[class*="author"]"#,
        ],
        TextMode::Listed,
    )
});

static DATE_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    let mut strategies = select_all(
        &[
            "div.pub-date", "div.published-date", "span.pub-date",
            "div.date", r#"[class*="date"]"#, r#"[class*="publish"]"#,
        ],
        TextMode::Spaced,
    );
    strategies.push(Strategy::FirstPublished);
    strategies
});

static DOI_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| vec![Strategy::DoiLink]);

static ABSTRACT_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    select_all(
        &[
            "div.abstract", "div.abstractSection", "div.hlFld-Abstract",
            "p.abstract", r#"[class*="abstract"]"#,
        ],
        TextMode::Abstract,
    )
});

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static LOOSE_CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div, article, li").unwrap());

static FIRST_PUBLISHED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)First\s+published(?:\s+online)?\s+([A-Za-z]+\s+\d{1,2},?\s+\d{4})").unwrap()
});
static DOI_HREF_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"doi\.org|/doi/").unwrap());
static DOI_CORE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(10\.\d{4,9}/[^\s/#?]+)").unwrap());
static ABSTRACT_TOGGLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Show|Hide|Preview|Full)\s*abstract\b").unwrap()
});
static ABSTRACT_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*Abstract\s*:?\s*").unwrap());
static LOOSE_CONTAINER_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)doi|author|abstract|volume|issue").unwrap()
});

/// Cap on containers taken from the loose fallback search
const LOOSE_CONTAINER_LIMIT: usize = 20;

/// Extract every article with a title from a table-of-contents page
pub fn extract_articles(html: &str) -> Vec<Article> {
    let document = Html::parse_document(html);

    let mut containers: Vec<ElementRef> = Vec::new();
    for (name, selector) in CONTAINER_SELECTORS.iter() {
        containers = document.select(selector).collect();
        if !containers.is_empty() {
            info!("Found {} article containers using selector: {}", containers.len(), name);
            break;
        }
    }

    if containers.is_empty() {
        containers = document
            .select(&LOOSE_CONTAINER_SELECTOR)
            .filter(|el| LOOSE_CONTAINER_HINT.is_match(&own_text(el)))
            .take(LOOSE_CONTAINER_LIMIT)
            .collect();
        debug!("Loose container search found {} candidates", containers.len());
    }

    containers
        .into_iter()
        .map(extract_article)
        .filter(|a| !a.title.is_empty())
        .collect()
}

/// Extract one article's fields from its container element
pub fn extract_article(container: ElementRef) -> Article {
    Article {
        title: first_match(container, &TITLE_STRATEGIES),
        authors: first_match(container, &AUTHOR_STRATEGIES),
        date: first_match(container, &DATE_STRATEGIES),
        doi: first_match(container, &DOI_STRATEGIES),
        abstract_text: first_match(container, &ABSTRACT_STRATEGIES),
    }
}

/// Fetch a page (local file, URL or shared-drive link) and extract its articles
pub async fn scrape_articles(loader: &DocumentLoader, source: &Source) -> Result<Vec<Article>, PipelineError> {
    let html = loader.fetch_text(source).await?;
    let articles = extract_articles(&html);
    info!("Scraped {} articles from {}", articles.len(), source);
    Ok(articles)
}

/// `https://doi.org/<doi>` when the href holds a DOI, otherwise the href itself
pub fn canonical_doi(href: &str) -> String {
    match DOI_CORE_REGEX.captures(href) {
        Some(caps) => format!("https://doi.org/{}", &caps[1]),
        None => href.to_string(),
    }
}

/// Strip "Show abstract"-style toggles and a leading "Abstract:" label
pub fn clean_abstract(raw: &str) -> String {
    let without_toggles = ABSTRACT_TOGGLE_REGEX.replace_all(raw, "");
    let without_label = ABSTRACT_LABEL_REGEX.replace(&without_toggles, "");
    collapse_whitespace(&without_label)
}

fn first_match(container: ElementRef, strategies: &[Strategy]) -> String {
    strategies
        .iter()
        .find_map(|strategy| apply(container, strategy).filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

fn apply(container: ElementRef, strategy: &Strategy) -> Option<String> {
    match strategy {
        Strategy::Select(selector, mode) => {
            let element = container.select(selector).next()?;
            Some(match mode {
                TextMode::Spaced => collapse_whitespace(&joined_text(element, " ")),
                TextMode::Listed => collapse_whitespace(&joined_text(element, ", "))
                    .trim_matches(|c| c == ' ' || c == ',')
                    .to_string(),
                TextMode::Abstract => clean_abstract(&joined_text(element, " ")),
            })
        }
        Strategy::FirstPublished => {
            let text = joined_text(container, " ");
            FIRST_PUBLISHED_REGEX
                .captures(&text)
                .map(|caps| caps[1].to_string())
        }
        Strategy::DoiLink => container
            .select(&LINK_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| DOI_HREF_REGEX.is_match(href))
            .map(canonical_doi),
    }
}

/// Non-empty trimmed text nodes joined with `separator`
fn joined_text(element: ElementRef, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Text directly inside the element, ignoring descendants
fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOC_PAGE: &str = r#"
        <html><body>
          <div class="issue-item">
            <h3 class="item-title"><a href="/doi/full/10.1177/00222429241234567">Pricing&nbsp;Under
              Uncertainty</a></h3>
            <div class="contrib"><span>Jane Doe</span><span>John Smith</span></div>
            <div class="pub-date">First published online November 16, 2024</div>
            <a class="doi" href="https://journals.example.com/doi/10.1177/00222429241234567?ref=toc">DOI</a>
            <div class="abstract">Show abstract Abstract: We study   prices.</div>
          </div>
          <div class="issue-item">
            <h4>Second Paper</h4>
            <p>Volume 89 · First Published January 3 2025</p>
          </div>
          <div class="issue-item"><p>No title here</p></div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_articles_with_titles() {
        let articles = extract_articles(TOC_PAGE);
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Pricing Under Uncertainty");
        assert_eq!(first.authors, "Jane Doe, John Smith");
        assert_eq!(first.date, "First published online November 16, 2024");
        assert_eq!(first.doi, "https://doi.org/10.1177/00222429241234567");
        assert_eq!(first.abstract_text, "We study prices.");

        let second = &articles[1];
        assert_eq!(second.title, "Second Paper");
        assert_eq!(second.authors, "");
        assert_eq!(second.date, "January 3 2025");
        assert_eq!(second.doi, "");
    }

    #[test]
    fn test_loose_container_fallback() {
        let html = r#"<html><body><li>Issue 4<h2>Loose Article</h2></li></body></html>"#;
        let articles = extract_articles(html);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Loose Article");
    }

    #[test]
    fn test_canonical_doi() {
        assert_eq!(canonical_doi("/doi/abs/10.1177/0022242921998385"), "https://doi.org/10.1177/0022242921998385");
        assert_eq!(canonical_doi("https://example.com/doi/none"), "https://example.com/doi/none");
    }

    #[test]
    fn test_clean_abstract() {
        assert_eq!(clean_abstract("Preview abstract\n  Abstract : Findings  here. Hide Abstract"), "Findings here.");
        assert_eq!(clean_abstract("Full abstract"), "");
    }
}

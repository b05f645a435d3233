//! Document loading from local paths and HTTP(S) URLs.
//!
//! File-sharing hosts answer large downloads with an HTML "can't scan this
//! file" page instead of the file. That page is detected, a confirmation
//! token is pulled out of it, and the download is requested once more with
//! the token. The warning page is never handed back as the document.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, SET_COOKIE};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::PipelineError;
use crate::notice::NoticeDocument;

static DRIVE_FILE_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/d/([0-9A-Za-z_-]{10,})").unwrap()
});

static CONFIRM_PARAM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"confirm=([0-9A-Za-z_-]+)").unwrap()
});

static DOWNLOAD_FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("form").unwrap()
});

static HIDDEN_INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"input[type="hidden"]"#).unwrap()
});

/// Strings that only appear on a download-warning page
const INTERSTITIAL_MARKERS: &[&str] = &[
    r#"id="download-form""#,
    r#"id="uc-download-link""#,
    r#"name="confirm""#,
    "Virus scan warning",
    "download_warning",
];

const DRIVE_HOSTS: &[&str] = &["drive.google.com", "docs.google.com"];

/// Where a document comes from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Remote(trimmed.to_string())
        } else {
            Source::Local(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Extract the file id from a shared-drive link (`/d/<id>/` or `?id=<id>`)
pub fn drive_file_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !DRIVE_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h)) {
        return None;
    }
    if let Some(caps) = DRIVE_FILE_ID_REGEX.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// One HTTP response, fully read
struct Page {
    url: Url,
    content_type: String,
    cookie_token: Option<String>,
    body: String,
}

impl Page {
    fn is_interstitial(&self) -> bool {
        self.cookie_token.is_some()
            || (self.is_html() && INTERSTITIAL_MARKERS.iter().any(|m| self.body.contains(m)))
    }

    fn is_html(&self) -> bool {
        self.content_type.contains("text/html") || self.body.trim_start().starts_with('<')
    }
}

type ConfirmStrategy = fn(&Page, &Url) -> Option<Url>;

/// Tried in order; first strategy that yields a URL wins
const CONFIRM_STRATEGIES: &[(&str, ConfirmStrategy)] = &[
    ("download-form", confirm_from_download_form),
    ("confirm-link", confirm_from_link),
    ("warning-cookie", confirm_from_cookie),
];

/// The form on the warning page carries every parameter the host wants back
fn confirm_from_download_form(page: &Page, _request_url: &Url) -> Option<Url> {
    let document = Html::parse_document(&page.body);

    for form in document.select(&DOWNLOAD_FORM_SELECTOR) {
        let hidden: Vec<(String, String)> = form
            .select(&HIDDEN_INPUT_SELECTOR)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                Some((name.to_string(), input.value().attr("value").unwrap_or("").to_string()))
            })
            .collect();

        let is_download_form = form.value().id() == Some("download-form")
            || hidden.iter().any(|(name, _)| name == "confirm");
        if !is_download_form {
            continue;
        }

        let mut target = match form.value().attr("action") {
            Some(action) => page.url.join(action).ok()?,
            None => page.url.clone(),
        };
        target.set_query(None);
        {
            let mut pairs = target.query_pairs_mut();
            for (name, value) in &hidden {
                pairs.append_pair(name, value);
            }
        }
        return Some(target);
    }
    None
}

fn confirm_from_link(page: &Page, request_url: &Url) -> Option<Url> {
    let token = CONFIRM_PARAM_REGEX.captures(&page.body)?.get(1)?.as_str().to_string();
    Some(with_confirm(request_url, &token))
}

fn confirm_from_cookie(page: &Page, request_url: &Url) -> Option<Url> {
    page.cookie_token.as_deref().map(|token| with_confirm(request_url, token))
}

fn with_confirm(url: &Url, token: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "confirm")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut target = url.clone();
    target.set_query(None);
    {
        let mut pairs = target.query_pairs_mut();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("confirm", token);
    }
    target
}

/// Fetches and decodes notice documents
pub struct DocumentLoader {
    client: reqwest::Client,
    drive_download_base: String,
}

impl DocumentLoader {
    pub fn new(config: &HttpConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| PipelineError::source_unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            drive_download_base: config.drive_download_base.clone(),
        })
    }

    /// Fetch and decode a notice document
    pub async fn load(&self, source: &Source) -> Result<NoticeDocument, PipelineError> {
        let content = self.fetch_text(source).await?;
        let doc = NoticeDocument::from_json_str(&content)?;
        info!("Loaded {} notices ({} infringing URLs) from {}", doc.notices.len(), doc.url_count(), source);
        Ok(doc)
    }

    /// Raw text of a source, with the download-warning round trip handled
    pub async fn fetch_text(&self, source: &Source) -> Result<String, PipelineError> {
        match source {
            Source::Local(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                PipelineError::source_unavailable(format!("cannot read {}: {}", path.display(), e))
            }),
            Source::Remote(url) => self.fetch_remote(url).await,
        }
    }

    /// Shared-drive view links become direct-download links; others pass through
    pub fn download_url(&self, raw: &str) -> Result<Url, PipelineError> {
        let url = Url::parse(raw)
            .map_err(|e| PipelineError::source_unavailable(format!("invalid URL '{}': {}", raw, e)))?;

        match drive_file_id(&url) {
            Some(id) => {
                let mut direct = Url::parse(&self.drive_download_base).map_err(|e| {
                    PipelineError::source_unavailable(format!("invalid download base '{}': {}", self.drive_download_base, e))
                })?;
                direct.query_pairs_mut().append_pair("export", "download").append_pair("id", &id);
                debug!("Rewrote shared-drive link {} -> {}", raw, direct);
                Ok(direct)
            }
            None => Ok(url),
        }
    }

    async fn fetch_remote(&self, raw: &str) -> Result<String, PipelineError> {
        let request_url = self.download_url(raw)?;
        let page = self.get_page(request_url.clone()).await?;

        if !page.is_interstitial() {
            if page.is_html() {
                debug!("{} answered with HTML ({})", request_url, page.content_type);
            }
            return Ok(page.body);
        }

        info!("Download warning page from {}, requesting confirmation", request_url);
        let confirm_url = CONFIRM_STRATEGIES
            .iter()
            .find_map(|(name, strategy)| {
                let url = strategy(&page, &request_url)?;
                debug!("Confirmation token found via {}", name);
                Some(url)
            })
            .ok_or_else(|| {
                PipelineError::access_denied(format!(
                    "{} returned a download confirmation page without a usable token",
                    request_url
                ))
            })?;

        let confirmed = self.get_page(confirm_url).await?;
        if confirmed.is_interstitial() {
            warn!("Confirmation for {} was not accepted", request_url);
            return Err(PipelineError::access_denied(format!(
                "{} still requires confirmation after the token was supplied",
                request_url
            )));
        }

        Ok(confirmed.body)
    }

    async fn get_page(&self, url: Url) -> Result<Page, PipelineError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::source_unavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PipelineError::access_denied(format!("{} answered {}", url, status)));
        }
        if !status.is_success() {
            return Err(PipelineError::source_unavailable(format!("{} answered {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let cookie_token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(download_warning_token);

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::source_unavailable(format!("failed reading body from {}: {}", url, e)))?;

        Ok(Page {
            url: final_url,
            content_type,
            cookie_token,
            body,
        })
    }
}

/// Value of a `download_warning*` cookie, if this Set-Cookie line carries one
fn download_warning_token(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    if name.trim().starts_with("download_warning") && !value.trim().is_empty() {
        Some(value.trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Page {
        Page {
            url: Url::parse("https://drive.example.com/uc?export=download&id=abc").unwrap(),
            content_type: "text/html; charset=utf-8".to_string(),
            cookie_token: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(Source::parse("https://x.org/a.json"), Source::Remote("https://x.org/a.json".to_string()));
        assert_eq!(Source::parse("HTTP://x.org"), Source::Remote("HTTP://x.org".to_string()));
        assert_eq!(Source::parse("data/notices.json"), Source::Local(PathBuf::from("data/notices.json")));
    }

    #[test]
    fn test_drive_file_id() {
        let share = Url::parse("https://drive.google.com/file/d/1At1Y8CbwlInSQC5fbMvyExklEEKvctli/view?usp=sharing").unwrap();
        assert_eq!(drive_file_id(&share).as_deref(), Some("1At1Y8CbwlInSQC5fbMvyExklEEKvctli"));

        let open = Url::parse("https://drive.google.com/open?id=XYZ123").unwrap();
        assert_eq!(drive_file_id(&open).as_deref(), Some("XYZ123"));

        let other = Url::parse("https://example.com/file/d/1At1Y8CbwlInSQC5fbMvyExklEEKvctli/view").unwrap();
        assert_eq!(drive_file_id(&other), None);
    }

    #[test]
    fn test_download_url_rewrites_share_links() {
        let loader = DocumentLoader::new(&HttpConfig::default()).unwrap();
        let url = loader
            .download_url("https://drive.google.com/file/d/1At1Y8CbwlInSQC5fbMvyExklEEKvctli/view?usp=sharing")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://drive.google.com/uc?export=download&id=1At1Y8CbwlInSQC5fbMvyExklEEKvctli"
        );

        let plain = loader.download_url("https://example.com/notices.json").unwrap();
        assert_eq!(plain.as_str(), "https://example.com/notices.json");
    }

    #[test]
    fn test_confirm_from_download_form() {
        let p = page(
            r#"<html><body><form id="download-form" action="https://drive.usercontent.example.com/download" method="get">
                <input type="submit" value="Download anyway"/>
                <input type="hidden" name="id" value="abc">
                <input type="hidden" name="export" value="download">
                <input type="hidden" name="confirm" value="t">
                <input type="hidden" name="uuid" value="1234-5678">
            </form></body></html>"#,
        );
        let url = confirm_from_download_form(&p, &p.url).unwrap();
        assert_eq!(
            url.as_str(),
            "https://drive.usercontent.example.com/download?id=abc&export=download&confirm=t&uuid=1234-5678"
        );
    }

    #[test]
    fn test_confirm_from_link_replaces_existing_token() {
        let p = page(r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=Xy_9&amp;id=abc">Download</a>"#);
        let request = Url::parse("https://drive.example.com/uc?export=download&id=abc&confirm=old").unwrap();
        let url = confirm_from_link(&p, &request).unwrap();
        assert_eq!(url.as_str(), "https://drive.example.com/uc?export=download&id=abc&confirm=Xy_9");
    }

    #[test]
    fn test_download_warning_cookie() {
        assert_eq!(
            download_warning_token("download_warning_13058876669334088843_1At1=Tk9x; Path=/uc; Secure").as_deref(),
            Some("Tk9x")
        );
        assert_eq!(download_warning_token("NID=abc; Path=/"), None);
    }

    #[test]
    fn test_plain_html_is_not_interstitial() {
        assert!(!page("<html><body><h1>Journal of Marketing</h1></body></html>").is_interstitial());
        assert!(page(r#"<form id="download-form"></form>"#).is_interstitial());
    }
}

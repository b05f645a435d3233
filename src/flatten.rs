//! Denormalizes a notice document into one row per infringing URL.

use tracing::debug;
use url::Url;

use crate::notice::NoticeDocument;
use crate::row::Row;

/// Flatten in document order: notices, then works, then URLs.
///
/// Never drops a URL entry. Missing values become empty strings so every
/// reference still shows up in the counts downstream.
pub fn flatten(doc: &NoticeDocument) -> Vec<Row> {
    let mut rows = Vec::with_capacity(doc.url_count());

    for notice in &doc.notices {
        for work in &notice.works {
            for entry in &work.infringing_urls {
                let infringing_url = entry.url.clone().unwrap_or_default();
                let domain = extract_domain(&infringing_url);
                rows.push(Row::new(
                    notice.id.clone().unwrap_or_default(),
                    notice.title.clone().unwrap_or_default(),
                    notice.sender_name.clone().unwrap_or_default(),
                    notice.principal_name.clone().unwrap_or_default(),
                    notice.recipient_name.clone().unwrap_or_default(),
                    notice.date_sent.clone().unwrap_or_default(),
                    work.description.clone().unwrap_or_default(),
                    infringing_url,
                    domain,
                ));
            }
        }
    }

    debug!("Flattened {} notices into {} rows", doc.notices.len(), rows.len());
    rows
}

/// Lowercased host of `url`, or empty when there is none
pub fn extract_domain(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match Url::parse(trimmed) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.trim_end_matches('.').to_lowercase())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

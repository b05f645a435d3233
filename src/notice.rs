//! Notice document model.
//!
//! Decoding is lenient below the top level: a notice or work with missing or
//! oddly typed keys degrades to absent fields instead of failing the parse.
//! Only a document that is not JSON, or has no `notices` array, is rejected.

use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoticeDocument {
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Notice {
    pub id: Option<String>,
    pub title: Option<String>,
    pub sender_name: Option<String>,
    pub principal_name: Option<String>,
    pub recipient_name: Option<String>,
    /// ISO-8601-ish, possibly with a timezone
    pub date_sent: Option<String>,
    pub works: Vec<Work>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Work {
    pub description: Option<String>,
    pub infringing_urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UrlEntry {
    pub url: Option<String>,
}

impl NoticeDocument {
    pub fn from_json_str(content: &str) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| PipelineError::invalid_format(format!("not valid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, PipelineError> {
        let root = value
            .as_object()
            .ok_or_else(|| PipelineError::invalid_format("top-level value is not an object"))?;

        let notices = match root.get("notices") {
            Some(Value::Array(items)) => items.iter().map(Notice::from_value).collect(),
            Some(other) => {
                return Err(PipelineError::invalid_format(format!(
                    "'notices' must be an array, found {}",
                    json_type_name(other)
                )))
            }
            None => return Err(PipelineError::invalid_format("missing top-level 'notices' key")),
        };

        Ok(Self { notices })
    }

    /// Total number of infringing URL entries across all works
    pub fn url_count(&self) -> usize {
        self.notices
            .iter()
            .flat_map(|n| n.works.iter())
            .map(|w| w.infringing_urls.len())
            .sum()
    }
}

impl Notice {
    fn from_value(value: &Value) -> Self {
        Self {
            id: text_field(value, "id"),
            title: text_field(value, "title"),
            sender_name: text_field(value, "sender_name"),
            principal_name: text_field(value, "principal_name"),
            recipient_name: text_field(value, "recipient_name"),
            date_sent: text_field(value, "date_sent"),
            works: array_field(value, "works").iter().map(Work::from_value).collect(),
        }
    }
}

impl Work {
    fn from_value(value: &Value) -> Self {
        Self {
            description: text_field(value, "description"),
            infringing_urls: array_field(value, "infringing_urls")
                .iter()
                .map(UrlEntry::from_value)
                .collect(),
        }
    }
}

impl UrlEntry {
    fn from_value(value: &Value) -> Self {
        // Some exports list bare strings instead of {"url": ...} objects
        let url = match value {
            Value::String(s) => Some(s.clone()),
            _ => text_field(value, "url"),
        };
        Self { url }
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_nested_notice() {
        let doc = NoticeDocument::from_json_str(
            r#"{"notices": [{
                "id": 1234,
                "title": "DMCA Notice",
                "sender_name": "Agent",
                "principal_name": "Acme Media, Inc.",
                "recipient_name": "Google LLC",
                "date_sent": "2023-04-05T10:00:00Z",
                "works": [{"description": "Film", "infringing_urls": [{"url": "https://a.example.com/x"}]}]
            }]}"#,
        )
        .unwrap();

        assert_eq!(doc.notices.len(), 1);
        let notice = &doc.notices[0];
        assert_eq!(notice.id.as_deref(), Some("1234"));
        assert_eq!(notice.principal_name.as_deref(), Some("Acme Media, Inc."));
        assert_eq!(notice.works[0].infringing_urls[0].url.as_deref(), Some("https://a.example.com/x"));
        assert_eq!(doc.url_count(), 1);
    }

    #[test]
    fn test_missing_fields_degrade_to_none() {
        let doc = NoticeDocument::from_json_str(
            r#"{"notices": [{"title": null, "works": "not-a-list"}, 42]}"#,
        )
        .unwrap();

        assert_eq!(doc.notices.len(), 2);
        assert_eq!(doc.notices[0].title, None);
        assert!(doc.notices[0].works.is_empty());
        assert_eq!(doc.notices[1], Notice::default());
    }

    #[test]
    fn test_bare_string_urls_accepted() {
        let doc = NoticeDocument::from_json_str(
            r#"{"notices": [{"works": [{"infringing_urls": ["http://x.org/1", {"nope": 1}]}]}]}"#,
        )
        .unwrap();
        let urls = &doc.notices[0].works[0].infringing_urls;
        assert_eq!(urls[0].url.as_deref(), Some("http://x.org/1"));
        assert_eq!(urls[1].url, None);
    }

    #[test]
    fn test_rejects_non_json() {
        let err = NoticeDocument::from_json_str("<html>not json</html>").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFormat(_)));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(matches!(
            NoticeDocument::from_json_str("[1, 2, 3]"),
            Err(PipelineError::InvalidFormat(_))
        ));
        assert!(matches!(
            NoticeDocument::from_json_str(r#"{"items": []}"#),
            Err(PipelineError::InvalidFormat(_))
        ));
        assert!(matches!(
            NoticeDocument::from_json_str(r#"{"notices": {"id": 1}}"#),
            Err(PipelineError::InvalidFormat(ref m)) if m.contains("object")
        ));
    }
}

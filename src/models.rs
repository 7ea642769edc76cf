//! Data models for harvested articles.
//!
//! - [`ArticleRecord`]: one article extracted from one fetched page
//! - [`Field`]: the logical fields a selector chain can target
//!
//! Records serialize with camelCase keys (`publishDate`, `sourceUrl`) in both
//! the JSON Lines archive and the JSON book.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single article extracted from a blog.
///
/// `source_url` is the canonical absolute URL of the article and the dedup key
/// for both the in-memory crawl and the persisted archive. A record is never
/// mutated after the extractor builds it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    /// The article headline. Never empty.
    pub title: String,
    /// The article body, one paragraph per line. Never empty.
    pub content: String,
    /// `YYYY-MM-DD` when the page date could be parsed, the raw date text when
    /// it could not, `None` when the page had no date at all.
    pub publish_date: Option<String>,
    /// The canonical URL the article was fetched from.
    pub source_url: String,
}

impl ArticleRecord {
    /// Date line used by renderers; absent dates render as `"Sin fecha"`.
    pub fn date_label(&self) -> &str {
        self.publish_date.as_deref().unwrap_or("Sin fecha")
    }

    /// Paragraphs of the body, skipping blank lines.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// A logical field resolved through its own selector chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Content,
    Date,
    NextPage,
    ArticleLink,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Content => "content",
            Field::Date => "date",
            Field::NextPage => "next_page",
            Field::ArticleLink => "article_link",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ArticleRecord {
        ArticleRecord {
            title: "Cómo germinar semillas".to_string(),
            content: "Primer párrafo.\n\n  Segundo párrafo.  \n".to_string(),
            publish_date: Some("2023-05-14".to_string()),
            source_url: "https://example.com/germinar".to_string(),
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.contains("\"publishDate\":\"2023-05-14\""));
        assert!(json.contains("\"sourceUrl\":\"https://example.com/germinar\""));
    }

    #[test]
    fn test_record_deserializes_missing_date_as_none() {
        let json = r#"{
            "title": "T",
            "content": "C",
            "publishDate": null,
            "sourceUrl": "https://example.com/a"
        }"#;
        let rec: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.publish_date, None);
        assert_eq!(rec.date_label(), "Sin fecha");
    }

    #[test]
    fn test_paragraphs_skip_blank_lines() {
        let rec = record();
        let paras: Vec<&str> = rec.paragraphs().collect();
        assert_eq!(paras, vec!["Primer párrafo.", "Segundo párrafo."]);
    }

    #[test]
    fn test_field_display() {
        assert_eq!(Field::NextPage.to_string(), "next_page");
        assert_eq!(Field::Title.to_string(), "title");
    }
}

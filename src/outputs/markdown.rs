//! Markdown book rendering.
//!
//! ```text
//! # <book title>
//!
//! - [Article one](#article-one)
//!
//! ## Article one
//!
//! *Fecha: 2023-05-14* · <https://blog.example/article-one>
//!
//! First paragraph.
//!
//! Second paragraph.
//! ```

use crate::models::ArticleRecord;
use crate::utils::slugify_title;

/// Render every record as one chapter of a Markdown book, with a table of
/// contents up front.
pub fn records_to_markdown(book_title: &str, records: &[ArticleRecord]) -> String {
    let mut md = format!("# {book_title}\n\n");

    for record in records {
        md.push_str(&format!(
            "- [{}](#{})\n",
            record.title,
            slugify_title(&record.title)
        ));
    }

    for record in records {
        md.push_str(&format!("\n## {}\n\n", record.title));
        md.push_str(&format!(
            "*Fecha: {}* · <{}>\n",
            record.date_label(),
            record.source_url
        ));
        for paragraph in record.paragraphs() {
            md.push('\n');
            md.push_str(paragraph);
            md.push('\n');
        }
    }
    md
}

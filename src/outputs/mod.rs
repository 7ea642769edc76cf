//! Book rendering for harvested articles.
//!
//! Rendering sits outside the crawl: it only needs records with a non-empty
//! title and body and a best-effort date label.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed JSON array of records
//! - [`markdown`]: a single Markdown book, one chapter per article
//!
//! # Output Structure
//!
//! ```text
//! <output>.md    # --format markdown (default)
//! <output>.json  # --format json
//! ```

pub mod json;
pub mod markdown;

use crate::models::ArticleRecord;
use clap::ValueEnum;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Render `records` to `path` in `format`.
#[instrument(level = "info", skip(records, path), fields(articles = records.len(), path = %path.display()))]
pub async fn write_book(
    records: &[ArticleRecord],
    format: OutputFormat,
    path: &Path,
    title: &str,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Markdown => {
            let md = markdown::records_to_markdown(title, records);
            tokio::fs::write(path, md).await?;
        }
        OutputFormat::Json => json::write_records(records, path).await?,
    }
    info!("Wrote book");
    Ok(())
}

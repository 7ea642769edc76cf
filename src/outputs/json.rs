//! JSON export of harvested articles.

use crate::models::ArticleRecord;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write `records` to `path` as a pretty-printed JSON array.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_records(records: &[ArticleRecord], path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).await?;
    info!(count = records.len(), "Wrote JSON export");
    Ok(())
}

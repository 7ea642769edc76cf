//! Article persistence.
//!
//! The crawl only needs two operations from storage: "is this URL already
//! captured" and "persist this record". [`ArticleStore`] is that seam.
//!
//! - [`JsonLinesStore`]: one JSON object per line in an append-only file,
//!   with an in-memory URL index rebuilt at open
//! - `MemoryStore`: process-local store used by the crawl tests
//!
//! Both reject a second record for the same `source_url`.

use crate::models::ArticleRecord;
use itertools::Itertools;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article {0} is already stored")]
    Duplicate(String),

    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode article: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Existence check and save for harvested articles.
pub trait ArticleStore {
    async fn exists(&self, url: &str) -> bool;

    async fn save(&self, record: &ArticleRecord) -> Result<(), StoreError>;

    /// Every stored record, in insertion order.
    async fn records(&self) -> Result<Vec<ArticleRecord>, StoreError>;
}

/// Append-only JSON Lines archive.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    index: Mutex<HashSet<String>>,
}

impl JsonLinesStore {
    /// Open (or prepare to create) the archive at `path` and index its URLs.
    ///
    /// Lines that do not decode as an [`ArticleRecord`] are skipped with a
    /// warning rather than failing the open.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut index = HashSet::new();
        if fs::try_exists(&path).await? {
            let raw = fs::read_to_string(&path).await?;
            for record in decode_lines(&raw) {
                index.insert(record.source_url);
            }
        }
        info!(articles = index.len(), "Opened article store");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }
}

fn decode_lines(raw: &str) -> Vec<ArticleRecord> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<ArticleRecord>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(line = n + 1, error = %e, "Skipping undecodable store line");
                None
            }
        })
        .unique_by(|record| record.source_url.clone())
        .collect()
}

impl ArticleStore for JsonLinesStore {
    async fn exists(&self, url: &str) -> bool {
        self.index.lock().await.contains(url)
    }

    async fn save(&self, record: &ArticleRecord) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;
        if index.contains(&record.source_url) {
            return Err(StoreError::Duplicate(record.source_url.clone()));
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        index.insert(record.source_url.clone());
        debug!(url = %record.source_url, path = %self.path.display(), "Saved article");
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).await?;
        Ok(decode_lines(&raw))
    }
}

/// In-memory store.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ArticleRecord>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[cfg(test)]
impl ArticleStore for MemoryStore {
    async fn exists(&self, url: &str) -> bool {
        self.records
            .lock()
            .await
            .iter()
            .any(|r| r.source_url == url)
    }

    async fn save(&self, record: &ArticleRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.iter().any(|r| r.source_url == record.source_url) {
            return Err(StoreError::Duplicate(record.source_url.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        Ok(self.records.lock().await.clone())
    }
}

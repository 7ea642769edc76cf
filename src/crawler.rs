//! Crawl orchestration.
//!
//! A run has three phases:
//! 1. **Discovery**: the [`Frontier`] walks the listing pages sequentially
//! 2. **Filtering**: the first `max_articles` URLs are kept and URLs the
//!    store already holds are dropped
//! 3. **Extraction**: the rest go through a bounded pool of concurrent
//!    [`Extractor`] futures; results are deduplicated by `source_url` and
//!    queued to a single saver running alongside, so a slow store never
//!    holds back the fetches
//!
//! A failing article is logged and skipped; only an unreachable seed aborts
//! the run. Cancellation stops new dispatches, lets in-flight fetches finish,
//! and still returns (and persists) what was extracted.

use crate::config::PageSelectors;
use crate::extract::{ExtractError, Extractor};
use crate::fetch::{FailureKind, Fetcher, Transport};
use crate::frontier::{CrawlError, Frontier, WalkEnd};
use crate::models::{ArticleRecord, Field};
use crate::store::ArticleStore;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::pin::pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Why an article URL was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingField(Field),
    Fetch { kind: FailureKind, reason: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing {field}"),
            SkipReason::Fetch { kind, reason } => write!(f, "{kind} fetch failure: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub url: String,
    pub reason: SkipReason,
}

/// Counts and results of one crawl run.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub pages_visited: usize,
    pub walk_end: Option<WalkEnd>,
    /// Unique article URLs found on the listing pages.
    pub links_discovered: usize,
    /// URLs skipped because the store already had them.
    pub already_stored: usize,
    /// URLs handed to extraction workers.
    pub dispatched: usize,
    /// Extracted records, one per `source_url`, sorted by URL.
    pub records: Vec<ArticleRecord>,
    pub skipped: Vec<Skipped>,
    /// Records extracted but not persisted; they are still in `records`.
    pub save_failures: usize,
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn extracted(&self) -> usize {
        self.records.len()
    }

    /// A run fails only when work was dispatched and nothing came back.
    pub fn is_failure(&self) -> bool {
        self.dispatched > 0 && self.records.is_empty()
    }

    pub fn log_summary(&self) {
        info!(
            pages_visited = self.pages_visited,
            links_discovered = self.links_discovered,
            already_stored = self.already_stored,
            dispatched = self.dispatched,
            extracted = self.extracted(),
            skipped = self.skipped.len(),
            save_failures = self.save_failures,
            cancelled = self.cancelled,
            walk_end = ?self.walk_end,
            "Crawl summary"
        );
    }
}

/// Owns the fetcher, selectors and store for a crawl.
pub struct Crawler<T, S> {
    fetcher: Fetcher<T>,
    selectors: PageSelectors,
    store: S,
    max_pages: usize,
}

impl<T, S> Crawler<T, S>
where
    T: Transport,
    S: ArticleStore,
{
    pub fn new(fetcher: Fetcher<T>, selectors: PageSelectors, store: S, max_pages: usize) -> Self {
        Self {
            fetcher,
            selectors,
            store,
            max_pages,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Discover, filter and extract the articles reachable from `seed_url`.
    ///
    /// # Errors
    ///
    /// Only seed problems are errors; see [`CrawlError`].
    #[instrument(level = "info", skip(self, cancel))]
    pub async fn run(
        &self,
        seed_url: &str,
        max_articles: Option<usize>,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport, CrawlError> {
        let t0 = Instant::now();
        let discovery = Frontier::new(&self.fetcher, &self.selectors)
            .with_cancellation(cancel.clone())
            .discover_article_urls(seed_url, self.max_pages)
            .await?;

        let mut report = CrawlReport {
            pages_visited: discovery.pages_visited(),
            links_discovered: discovery.article_urls.len(),
            walk_end: Some(discovery.end.clone()),
            ..CrawlReport::default()
        };

        let limit = max_articles.unwrap_or(usize::MAX);
        let mut pending = Vec::new();
        for url in discovery.article_urls.into_iter().take(limit) {
            if self.store.exists(&url).await {
                debug!(%url, "Already stored; skipping");
                report.already_stored += 1;
            } else {
                pending.push(url);
            }
        }
        info!(
            candidates = pending.len() + report.already_stored,
            already_stored = report.already_stored,
            pending = pending.len(),
            concurrency,
            "Starting article extraction"
        );

        let extractor = Extractor::new(&self.fetcher, &self.selectors);
        let extractor = &extractor;
        let (saves, mut queued) = mpsc::channel::<ArticleRecord>(pending.len().max(1));

        let save_all = async move {
            let mut failures = 0usize;
            while let Some(record) = queued.recv().await {
                match self.store.save(&record).await {
                    Ok(()) => info!(url = %record.source_url, title = %record.title, "Saved article"),
                    Err(e) => {
                        failures += 1;
                        error!(url = %record.source_url, error = %e, "Failed to save article; keeping extracted record");
                    }
                }
            }
            failures
        };

        let tally = &mut report;
        let collect = async move {
            let mut results = pin!(
                stream::iter(pending)
                    .take_until(cancel.cancelled())
                    .map(move |url| async move {
                        let result = extractor.extract_article(&url).await;
                        (url, result)
                    })
                    .buffer_unordered(concurrency.max(1))
            );

            let mut records: BTreeMap<String, ArticleRecord> = BTreeMap::new();
            while let Some((url, result)) = results.next().await {
                tally.dispatched += 1;
                match result {
                    Ok(record) => {
                        if records.contains_key(&record.source_url) {
                            debug!(url = %record.source_url, "Duplicate record dropped");
                            continue;
                        }
                        // Capacity covers every pending URL, so this never waits.
                        if saves.send(record.clone()).await.is_err() {
                            error!(url = %record.source_url, "Save queue closed; record not persisted");
                        }
                        records.insert(record.source_url.clone(), record);
                    }
                    Err(ExtractError::MissingField { field, .. }) => {
                        warn!(%url, %field, "Article is missing a mandatory field; skipping");
                        tally.skipped.push(Skipped {
                            url,
                            reason: SkipReason::MissingField(field),
                        });
                    }
                    Err(ExtractError::Fetch { kind, reason, .. }) => {
                        warn!(%url, %kind, %reason, "Article fetch failed; skipping");
                        tally.skipped.push(Skipped {
                            url,
                            reason: SkipReason::Fetch { kind, reason },
                        });
                    }
                }
            }
            drop(saves);
            records
        };

        let (records, save_failures) = tokio::join!(collect, save_all);
        report.save_failures = save_failures;
        report.records = records.into_values().collect();
        report.cancelled = cancel.is_cancelled();
        if report.cancelled {
            warn!(extracted = report.extracted(), "Crawl cancelled; returning partial results");
        }
        let elapsed = t0.elapsed();
        info!(
            ?elapsed,
            extracted = report.extracted(),
            skipped = report.skipped.len(),
            "Crawl finished"
        );
        Ok(report)
    }
}

//! Pagination walk over a blog's listing pages.
//!
//! The walk is inherently sequential: the next listing URL is only known
//! after the current page is parsed. [`CrawlState`] is owned by a single walk
//! and never shared with the extraction workers.
//!
//! # Termination
//!
//! | Condition | [`WalkEnd`] |
//! |-----------|-------------|
//! | No next-page link | `NoNextPage` |
//! | Next link points at the current page | `SelfLoop` |
//! | Next link points at an already visited page | `LoopDetected` |
//! | `max_pages` listing pages visited | `MaxPages` |
//! | A later listing page failed to fetch | `FetchFailed` |
//! | Run cancelled | `Cancelled` |
//!
//! Only a failure on the seed page is an error; every other ending returns
//! what was discovered so far.

use crate::config::PageSelectors;
use crate::fetch::{FailureKind, Fetcher, Transport};
use crate::utils::{canonical_url, resolve_link};
use std::collections::HashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Errors that abort a whole crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("seed url is not an absolute http(s) URL: {0:?}")]
    InvalidSeed(String),

    #[error("seed page {url} could not be fetched ({kind}): {reason}")]
    SeedUnreachable {
        url: String,
        kind: FailureKind,
        reason: String,
    },
}

/// Pages visited and articles discovered during one walk.
#[derive(Debug, Default)]
pub struct CrawlState {
    visited_page_urls: HashSet<String>,
    discovered_article_urls: HashSet<String>,
    pages: Vec<String>,
    articles: Vec<String>,
}

impl CrawlState {
    /// Record a listing page visit. Returns `false` if it was already visited.
    pub fn visit_page(&mut self, url: &str) -> bool {
        if !self.visited_page_urls.insert(url.to_string()) {
            return false;
        }
        self.pages.push(url.to_string());
        true
    }

    /// Mark `url` visited without counting a page, for the final URL of a
    /// redirected fetch.
    pub fn alias_page(&mut self, url: &str) {
        self.visited_page_urls.insert(url.to_string());
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited_page_urls.contains(url)
    }

    /// Record an article URL. Returns `false` if it was already discovered.
    pub fn add_article(&mut self, url: String) -> bool {
        if !self.discovered_article_urls.insert(url.clone()) {
            return false;
        }
        self.articles.push(url);
        true
    }

    pub fn pages_visited(&self) -> usize {
        self.pages.len()
    }
}

/// Why a pagination walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    NoNextPage,
    SelfLoop,
    LoopDetected { next_url: String },
    MaxPages,
    FetchFailed { url: String, reason: String },
    Cancelled,
}

/// Result of a pagination walk.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Listing pages in walk order.
    pub listing_pages: Vec<String>,
    /// Unique article URLs in discovery order.
    pub article_urls: Vec<String>,
    pub end: WalkEnd,
}

impl Discovery {
    pub fn pages_visited(&self) -> usize {
        self.listing_pages.len()
    }

    fn from_state(state: CrawlState, end: WalkEnd) -> Self {
        Self {
            listing_pages: state.pages,
            article_urls: state.articles,
            end,
        }
    }
}

/// Walks listing pages from a seed URL and collects article links.
pub struct Frontier<'a, T> {
    fetcher: &'a Fetcher<T>,
    selectors: &'a PageSelectors,
    cancel: Option<CancellationToken>,
}

impl<'a, T> Frontier<'a, T>
where
    T: Transport,
{
    pub fn new(fetcher: &'a Fetcher<T>, selectors: &'a PageSelectors) -> Self {
        Self {
            fetcher,
            selectors,
            cancel: None,
        }
    }

    /// Stop the walk before the next listing fetch once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Walk at most `max_pages` listing pages starting at `seed_url`.
    ///
    /// Article links are resolved against the page they appear on, so
    /// relative links on deep listing pages resolve correctly.
    ///
    /// # Errors
    ///
    /// [`CrawlError::InvalidSeed`] for an unusable seed URL and
    /// [`CrawlError::SeedUnreachable`] when the seed page itself cannot be
    /// fetched. Later failures end the walk with partial results.
    #[instrument(level = "info", skip(self))]
    pub async fn discover_article_urls(
        &self,
        seed_url: &str,
        max_pages: usize,
    ) -> Result<Discovery, CrawlError> {
        let seed = canonical_url(seed_url)
            .ok_or_else(|| CrawlError::InvalidSeed(seed_url.to_string()))?;
        let max_pages = max_pages.max(1);
        let mut state = CrawlState::default();
        let mut current = seed.to_string();

        let end = loop {
            if self.is_cancelled() {
                info!(page = %current, "Cancelled before fetching listing page");
                break WalkEnd::Cancelled;
            }
            state.visit_page(&current);

            let page = match self.fetcher.fetch(&current).await.into_result() {
                Ok(page) => page,
                Err((kind, reason)) => {
                    if state.pages_visited() == 1 {
                        return Err(CrawlError::SeedUnreachable {
                            url: current,
                            kind,
                            reason,
                        });
                    }
                    warn!(page = %current, %kind, %reason, "Listing page fetch failed; ending walk with partial results");
                    break WalkEnd::FetchFailed {
                        url: current,
                        reason,
                    };
                }
            };
            if page.url.as_str() != current {
                debug!(page = %current, final_url = %page.url, "Listing page redirected");
                state.alias_page(page.url.as_str());
            }

            let hrefs = self.selectors.article_links.resolve_all(&page.html);
            let found = hrefs.len();
            let mut added = 0usize;
            for href in hrefs {
                match resolve_link(&page.url, &href) {
                    Some(url) => {
                        if state.add_article(url) {
                            added += 1;
                        }
                    }
                    None => debug!(%href, page = %page.url, "Skipping unusable article link"),
                }
            }
            info!(
                page = %current,
                page_number = state.pages_visited(),
                found,
                added,
                "Indexed listing page"
            );

            if state.pages_visited() >= max_pages {
                info!(max_pages, "Reached pagination limit");
                break WalkEnd::MaxPages;
            }

            let next = self
                .selectors
                .next_page
                .resolve(&page.html)
                .and_then(|href| resolve_link(&page.url, &href));
            let Some(next) = next else {
                break WalkEnd::NoNextPage;
            };
            if next == current || next == page.url.as_str() {
                debug!(page = %current, "Next-page link points at itself");
                break WalkEnd::SelfLoop;
            }
            if state.has_visited(&next) {
                info!(page = %current, next = %next, "Pagination loop detected; ending walk");
                break WalkEnd::LoopDetected { next_url: next };
            }
            current = next;
        };

        let discovery = Discovery::from_state(state, end);
        info!(
            pages = discovery.pages_visited(),
            articles = discovery.article_urls.len(),
            end = ?discovery.end,
            "Pagination walk finished"
        );
        Ok(discovery)
    }
}

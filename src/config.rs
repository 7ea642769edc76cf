//! Crawl configuration loaded from YAML.
//!
//! Every field has a default, so an empty (or absent) `config.yaml` yields a
//! working crawl of the default blog. Selector chains are plain data here and
//! are compiled into [`PageSelectors`] once at startup.
//!
//! ```yaml
//! seed_url: https://blog.example/
//! concurrency: 4
//! politeness: { min_ms: 500, max_ms: 1500 }
//! retry: { max_attempts: 4, backoff: fixed }
//! selectors:
//!   title:
//!     - selector: h1.entry-title
//!     - selector: meta[property="og:title"]
//!       attribute: content
//! ```

use crate::models::Field;
use crate::retry::{Backoff, PolitenessDelay, RetryPolicy};
use crate::selectors::{SelectorChain, SelectorRule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

/// Browser-like User-Agent; some blog hosts reject obvious bots outright.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("selector chain for {0} has no rules")]
    EmptySelectorChain(Field),

    #[error("seed url must be an absolute http(s) URL, got {0:?}")]
    InvalidSeedUrl(String),

    #[error("concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("max_pages must be greater than 0")]
    ZeroMaxPages,

    #[error("retry.max_attempts must be greater than 0")]
    ZeroMaxAttempts,

    #[error("politeness range is inverted: min {min_ms} ms > max {max_ms} ms")]
    InvertedPoliteness { min_ms: u64, max_ms: u64 },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Top-level crawl configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// First listing page of the blog.
    pub seed_url: String,
    pub user_agent: String,
    /// Maximum number of listing pages walked.
    pub max_pages: usize,
    /// Process only the first N discovered articles.
    pub max_articles: Option<usize>,
    /// Maximum number of concurrent article extractions.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub politeness: PolitenessConfig,
    pub retry: RetryConfig,
    pub selectors: SelectorsConfig,
    /// JSON Lines archive of every article captured so far.
    pub store_path: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: "https://cultivoloco.com.ar/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: 100,
            max_articles: None,
            concurrency: 10,
            timeout_secs: 10,
            politeness: PolitenessConfig::default(),
            retry: RetryConfig::default(),
            selectors: SelectorsConfig::default(),
            store_path: "articles.jsonl".to_string(),
        }
    }
}

impl CrawlConfig {
    /// Load the configuration from `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file
    /// cannot be read or is not valid YAML for this schema.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        info!(path = %shown, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as an empty map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Check the invariants the crawl relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seed_ok = Url::parse(&self.seed_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !seed_ok {
            return Err(ConfigError::InvalidSeedUrl(self.seed_url.clone()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroMaxPages);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if self.politeness.min_ms > self.politeness.max_ms {
            return Err(ConfigError::InvertedPoliteness {
                min_ms: self.politeness.min_ms,
                max_ms: self.politeness.max_ms,
            });
        }
        self.selectors.compile().map(|_| ())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Range of the randomized pause before each request, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolitenessConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            min_ms: 200,
            max_ms: 800,
        }
    }
}

impl PolitenessConfig {
    pub fn delay(&self) -> PolitenessDelay {
        PolitenessDelay::new(
            Duration::from_millis(self.min_ms),
            Duration::from_millis(self.max_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per fetch, the first one included.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff,
        )
        .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// Selector chains for every logical field, as configuration data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub article_links: Vec<SelectorRule>,
    pub next_page: Vec<SelectorRule>,
    pub title: Vec<SelectorRule>,
    pub content: Vec<SelectorRule>,
    pub date: Vec<SelectorRule>,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            article_links: vec![
                SelectorRule::attr("a.post-link", "href"),
                SelectorRule::attr("h2.entry-title a", "href"),
                SelectorRule::attr(".post-title a", "href"),
                SelectorRule::attr("article h2 a", "href"),
            ],
            next_page: vec![
                SelectorRule::attr("a.next", "href"),
                SelectorRule::attr("a[rel~=\"next\"]", "href"),
                SelectorRule::attr("link[rel=\"next\"]", "href"),
                SelectorRule::attr(".nav-previous a", "href"),
            ],
            title: vec![
                SelectorRule::text("h1.entry-title"),
                SelectorRule::text("h1.post-title"),
                SelectorRule::text("article h1"),
                SelectorRule::attr("meta[property=\"og:title\"]", "content"),
                SelectorRule::text("h1"),
            ],
            content: vec![
                SelectorRule::text("div.post-content"),
                SelectorRule::text("div.entry-content"),
                SelectorRule::text("article .content"),
                SelectorRule::text("article"),
            ],
            date: vec![
                SelectorRule::attr("time.post-date", "datetime"),
                SelectorRule::text("time.post-date"),
                SelectorRule::attr("time[datetime]", "datetime"),
                SelectorRule::attr("meta[property=\"article:published_time\"]", "content"),
                SelectorRule::text(".entry-date"),
            ],
        }
    }
}

/// Compiled selector chains for every logical field.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    pub article_links: SelectorChain,
    pub next_page: SelectorChain,
    pub title: SelectorChain,
    pub content: SelectorChain,
    pub date: SelectorChain,
}

impl SelectorsConfig {
    pub fn compile(&self) -> Result<PageSelectors, ConfigError> {
        Ok(PageSelectors {
            article_links: SelectorChain::new(Field::ArticleLink, self.article_links.clone())?,
            next_page: SelectorChain::new(Field::NextPage, self.next_page.clone())?,
            title: SelectorChain::new(Field::Title, self.title.clone())?,
            content: SelectorChain::new(Field::Content, self.content.clone())?,
            date: SelectorChain::new(Field::Date, self.date.clone())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlConfig::default();
        config.validate().unwrap();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
seed_url: https://blog.example/
concurrency: 4
retry:
  max_attempts: 5
  backoff: fixed
selectors:
  title:
    - selector: h1.headline
    - selector: meta[property="og:title"]
      attribute: content
"#;
        let config = CrawlConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.seed_url, "https://blog.example/");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff, Backoff::Fixed);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.selectors.title.len(), 2);
        assert_eq!(
            config.selectors.title[1].attribute.as_deref(),
            Some("content")
        );
        assert_eq!(config.selectors.content, SelectorsConfig::default().content);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(CrawlConfig::from_yaml("  \n").unwrap(), CrawlConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CrawlConfig::default();
        config.seed_url = "/relative".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSeedUrl(_))));

        let mut config = CrawlConfig::default();
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));

        let mut config = CrawlConfig::default();
        config.politeness = PolitenessConfig { min_ms: 900, max_ms: 100 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedPoliteness { min_ms: 900, max_ms: 100 })
        ));

        let mut config = CrawlConfig::default();
        config.selectors.date.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySelectorChain(Field::Date))
        ));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = CrawlConfig::load(Some(Path::new("/nonexistent/config.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/config.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "max_pages: 7\npoliteness: { min_ms: 0, max_ms: 0 }\n").unwrap();
        let config = CrawlConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.politeness.delay(), PolitenessDelay::none());
    }

    #[test]
    fn test_retry_config_policy() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }
}

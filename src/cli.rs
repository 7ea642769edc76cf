//! Command-line interface definitions for Blog Harvest.
//!
//! Every crawl setting lives in [`CrawlConfig`]; the flags here override the
//! handful that change from one run to the next. Several can also be set
//! through environment variables.

use crate::config::CrawlConfig;
use crate::outputs::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for Blog Harvest.
///
/// # Examples
///
/// ```sh
/// # Crawl the default blog into articles.jsonl and render blog_book.md
/// blog_harvest
///
/// # Another blog, custom selectors, JSON book
/// blog_harvest -c blog.yaml --seed-url https://example.com/blog/ --format json
///
/// # Only the newest 20 articles, 4 fetches at a time
/// blog_harvest --max-articles 20 -j 4
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML crawl configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// First listing page of the blog
    #[arg(long, env = "BLOG_HARVEST_SEED_URL")]
    pub seed_url: Option<String>,

    /// Maximum listing pages to walk
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Stop after this many discovered articles
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Concurrent article fetches
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// JSON Lines archive of harvested articles
    #[arg(short, long, env = "BLOG_HARVEST_STORE")]
    pub store: Option<String>,

    /// Book format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Book path without extension
    #[arg(short, long, default_value = "blog_book")]
    pub output: PathBuf,

    /// Book title (defaults to the seed host)
    #[arg(long)]
    pub title: Option<String>,

    /// Crawl and store only; skip rendering the book
    #[arg(long)]
    pub no_render: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(seed) = &self.seed_url {
            config.seed_url = seed.clone();
        }
        if let Some(n) = self.max_pages {
            config.max_pages = n;
        }
        if self.max_articles.is_some() {
            config.max_articles = self.max_articles;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
    }

    /// Book path with the extension of the chosen format.
    pub fn output_path(&self) -> PathBuf {
        self.output.with_extension(self.format.extension())
    }
}

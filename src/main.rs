//! # Blog Harvest
//!
//! Walks the paginated listing of a blog, extracts every article it links to,
//! and keeps them in a deduplicated local archive that is rendered as a book.
//!
//! ## Usage
//!
//! ```sh
//! blog_harvest --seed-url https://cultivoloco.com.ar/ -o cultivo_loco
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: follow "next page" links from the seed, collecting
//!    article URLs ([`frontier`])
//! 2. **Filtering**: drop URLs the archive already holds ([`store`])
//! 3. **Extraction**: fetch and parse new articles, a bounded number at a
//!    time ([`crawler`], [`extract`])
//! 4. **Output**: render every archived article as Markdown or JSON
//!    ([`outputs`])
//!
//! Ctrl-C cancels the crawl: no new fetches start, and whatever was already
//! extracted is saved and rendered.

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawler;
mod dates;
mod extract;
mod fetch;
mod frontier;
mod models;
mod outputs;
mod retry;
mod selectors;
mod store;
#[cfg(test)]
mod test_support;
mod utils;

use cli::Cli;
use config::CrawlConfig;
use crawler::Crawler;
use fetch::{Fetcher, ReqwestTransport};
use store::{ArticleStore, JsonLinesStore};
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("blog_harvest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Config ---
    let mut config = CrawlConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    let selectors = config.selectors.compile()?;
    info!(
        seed_url = %config.seed_url,
        max_pages = config.max_pages,
        max_articles = ?config.max_articles,
        concurrency = config.concurrency,
        store = %config.store_path,
        "Loaded configuration"
    );

    // Early check: the book must be writable before spending a crawl on it
    let output_path = args.output_path();
    if !args.no_render {
        if let Err(e) = ensure_writable_parent(&output_path).await {
            error!(
                path = %output_path.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // --- Pipeline ---
    let store = JsonLinesStore::open(&config.store_path).await?;
    let transport = ReqwestTransport::new(&config.user_agent, config.timeout())?;
    let fetcher = Fetcher::new(transport, config.retry.policy(), config.politeness.delay());
    let crawler = Crawler::new(fetcher, selectors, store, config.max_pages);

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight articles");
            watcher.cancel();
        }
    });

    let report = crawler
        .run(
            &config.seed_url,
            config.max_articles,
            config.concurrency,
            &cancel,
        )
        .await?;
    report.log_summary();
    info!(
        archived = crawler.store().len().await,
        path = %crawler.store().path().display(),
        "Archive updated"
    );

    // --- Book ---
    if !args.no_render {
        let records = crawler.store().records().await?;
        let title = args.title.clone().unwrap_or_else(|| book_title(&config.seed_url));
        if let Err(e) = outputs::write_book(&records, args.format, &output_path, &title).await {
            error!(path = %output_path.display(), error = %e, "Failed writing book");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if report.is_failure() {
        return Err(format!(
            "none of the {} dispatched articles could be extracted",
            report.dispatched
        )
        .into());
    }
    Ok(())
}

fn book_title(seed_url: &str) -> String {
    utils::canonical_url(seed_url)
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "Blog".to_string())
}

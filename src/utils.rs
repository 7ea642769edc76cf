//! Utility functions for text cleanup, URL canonicalization, and file system checks.
//!
//! This module provides helpers used throughout the crawl pipeline:
//! - Whitespace normalization and text flattening for HTML elements
//! - URL resolution and canonicalization (the dedup key for articles)
//! - String truncation and slugification for logging and Markdown anchors
//! - File system validation for output locations

use itertools::Itertools;
use scraper::{ElementRef, Node};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Collapse every run of whitespace into one space and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Elements that start a new line of text: their content never runs into
/// the text around them.
pub const BLOCK_TAGS: [&str; 30] = [
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements whose content is never visible text.
pub const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "iframe"];

/// Visible text of `element` on one normalized line.
///
/// Text nodes are concatenated as written, so a word split by inline markup
/// (`Hel<b>lo</b>`) stays whole. `<br>` and block boundaries count as
/// whitespace.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    normalize_whitespace(&out)
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let breaks = name == "br" || BLOCK_TAGS.contains(&name);
                if breaks {
                    out.push(' ');
                }
                push_text(child, out);
                if breaks {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Parse `raw` as an absolute http(s) URL in canonical form.
///
/// Canonical form drops the fragment; everything else (scheme and host case,
/// default ports, dot segments) is normalized by the `url` crate.
///
/// # Returns
///
/// `None` if `raw` is not an absolute URL or uses a scheme other than
/// `http`/`https`.
pub fn canonical_url(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Resolve an `href` found on the page at `base` into a canonical absolute URL.
///
/// In-page anchors and non-navigational schemes (`mailto:`, `javascript:`,
/// `tel:`) resolve to `None`.
///
/// # Examples
///
/// ```ignore
/// let base = Url::parse("https://blog.example/page/2/").unwrap();
/// assert_eq!(
///     resolve_link(&base, "../post#comments").as_deref(),
///     Some("https://blog.example/page/post")
/// );
/// ```
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let joined = base.join(href).ok()?;
    canonical_url(joined.as_str()).map(String::from)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Convert a title to a Markdown anchor slug.
///
/// Lowercases the text, removes special characters, and replaces spaces with
/// hyphens.
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
}

/// Ensure the directory that will hold `path` exists and is writable.
///
/// Creates the parent directory if needed, then performs a write test by
/// creating and immediately deleting a scratch file next to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    // Try a small sync write using std fs (simpler error surface)
    let scratch_path = dir.join("..__write_check__");
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}

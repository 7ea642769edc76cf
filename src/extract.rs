//! Article extraction.
//!
//! Turns one fetched article page into an [`ArticleRecord`]. Title and
//! content are mandatory; the date is best-effort (see [`crate::dates`]).
//! No retries happen here: the [`Fetcher`] owns retry policy.

use crate::config::PageSelectors;
use crate::dates::publish_date_value;
use crate::fetch::{FailureKind, Fetcher, Transport};
use crate::models::{ArticleRecord, Field};
use crate::utils::{BLOCK_TAGS, SKIPPED_TAGS, canonical_url, normalize_whitespace, truncate_for_log};
use scraper::{ElementRef, Html, Node};
use thiserror::Error;
use tracing::{debug, instrument};

/// Why an article URL produced no record.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("fetch of {url} failed ({kind}): {reason}")]
    Fetch {
        url: String,
        kind: FailureKind,
        reason: String,
    },

    #[error("{url} has no {field}")]
    MissingField { url: String, field: Field },
}

/// Fetches article pages and resolves their fields.
pub struct Extractor<'a, T> {
    fetcher: &'a Fetcher<T>,
    selectors: &'a PageSelectors,
}

impl<'a, T> Extractor<'a, T>
where
    T: Transport,
{
    pub fn new(fetcher: &'a Fetcher<T>, selectors: &'a PageSelectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Fetch `url` and build its record.
    #[instrument(level = "info", skip(self))]
    pub async fn extract_article(&self, url: &str) -> Result<ArticleRecord, ExtractError> {
        let page = self
            .fetcher
            .fetch(url)
            .await
            .into_result()
            .map_err(|(kind, reason)| ExtractError::Fetch {
                url: url.to_string(),
                kind,
                reason,
            })?;
        let source_url = canonical_url(url)
            .map(String::from)
            .unwrap_or_else(|| url.to_string());
        parse_article(self.selectors, &source_url, &page.html)
    }
}

/// Resolve title, content and date of an already parsed article page.
pub fn parse_article(
    selectors: &PageSelectors,
    source_url: &str,
    html: &Html,
) -> Result<ArticleRecord, ExtractError> {
    let missing = |field| ExtractError::MissingField {
        url: source_url.to_string(),
        field,
    };

    let title = selectors.title.resolve(html).ok_or_else(|| missing(Field::Title))?;
    let content = selectors
        .content
        .select_element(html)
        .map(assemble_content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| missing(Field::Content))?;
    let publish_date = publish_date_value(selectors.date.resolve(html));

    debug!(
        %source_url,
        title = %truncate_for_log(&title, 80),
        content_bytes = content.len(),
        ?publish_date,
        "Parsed article"
    );
    Ok(ArticleRecord {
        title,
        content,
        publish_date,
        source_url: source_url.to_string(),
    })
}

/// Split the visible text of `container` into paragraphs, one per line, in
/// document order.
///
/// Every block element (`p`, `li`, `td`, `div`, ...) closes the paragraph
/// before it and starts a new one, and so does `<br>`. Loose text and inline
/// markup between blocks form paragraphs of their own, so nothing outside
/// `<p>` tags is lost.
fn assemble_content(container: ElementRef<'_>) -> String {
    let mut paragraphs = Paragraphs::default();
    paragraphs.walk(container);
    paragraphs.finish().join("\n")
}

#[derive(Default)]
struct Paragraphs {
    done: Vec<String>,
    line: String,
}

impl Paragraphs {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.line.push_str(text),
                Node::Element(el) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = el.name();
                    if SKIPPED_TAGS.contains(&name) {
                        continue;
                    }
                    if name == "br" {
                        self.flush();
                    } else if BLOCK_TAGS.contains(&name) {
                        self.flush();
                        self.walk(child);
                        self.flush();
                    } else {
                        self.walk(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        let text = normalize_whitespace(&self.line);
        if !text.is_empty() {
            self.done.push(text);
        }
        self.line.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorsConfig;
    use crate::selectors::{SelectorChain, SelectorRule};
    use crate::test_support::{ScriptedTransport, article_page, fetcher};

    const URL: &str = "https://blog.example/2023/05/germinar";

    fn selectors() -> PageSelectors {
        SelectorsConfig::default().compile().unwrap()
    }

    #[test]
    fn test_paragraphs_are_newline_joined() {
        let html = Html::parse_document(&article_page(
            Some("Germinar"),
            &["Primero   remojar.", "Después <b>esperar</b>."],
            Some("14/05/2023"),
        ));
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(record.title, "Germinar");
        assert_eq!(record.content, "Primero remojar.\nDespués esperar.");
        assert_eq!(record.publish_date.as_deref(), Some("2023-05-14"));
        assert_eq!(record.source_url, URL);
    }

    #[test]
    fn test_nested_blocks_are_not_duplicated() {
        let html = Html::parse_document(
            r#"<h1 class="entry-title">T</h1>
            <div class="post-content">
              <h2>Materiales</h2>
              <ul><li><p>Semillas</p></li><li>Agua</li></ul>
              <blockquote><p>Cita</p></blockquote>
              <p>   </p>
            </div>"#,
        );
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(record.content, "Materiales\nSemillas\nAgua\nCita");
    }

    #[test]
    fn test_loose_text_line_breaks_and_tables_are_kept() {
        let html = Html::parse_document(
            r#"<h1 class="entry-title">T</h1>
            <div class="post-content">Intro suelta sin parrafo.<p>Linea uno<br>Linea dos</p><table><tr><td>Dato de tabla</td></tr></table></div>"#,
        );
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(
            record.content,
            "Intro suelta sin parrafo.\nLinea uno\nLinea dos\nDato de tabla"
        );
    }

    #[test]
    fn test_inline_runs_between_blocks_are_paragraphs() {
        let html = Html::parse_document(
            r#"<h1 class="entry-title">T</h1>
            <div class="post-content"><p>Uno</p>Texto <em>suel</em>to<figure><img src="x.jpg"><figcaption>Pie</figcaption></figure><div><p>Anidado</p>cola</div><script>track()</script></div>"#,
        );
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(record.content, "Uno\nTexto suelto\nPie\nAnidado\ncola");
    }

    #[test]
    fn test_container_without_blocks_uses_flat_text() {
        let html = Html::parse_document(
            r#"<h1 class="entry-title">T</h1><div class="post-content"> Solo <span>texto</span> suelto </div>"#,
        );
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(record.content, "Solo texto suelto");
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let html = Html::parse_document(&article_page(None, &["Cuerpo"], None));
        let err = parse_article(&selectors(), URL, &html).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingField {
                field: Field::Title,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_content_is_an_error() {
        let html = Html::parse_document(r#"<h1 class="entry-title">Solo título</h1>"#);
        let err = parse_article(&selectors(), URL, &html).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingField {
                field: Field::Content,
                ..
            }
        ));
    }

    #[test]
    fn test_date_policy() {
        let raw = Html::parse_document(&article_page(Some("T"), &["C"], Some("hace 3 días")));
        let record = parse_article(&selectors(), URL, &raw).unwrap();
        assert_eq!(record.publish_date.as_deref(), Some("hace 3 días"));

        let absent = Html::parse_document(&article_page(Some("T"), &["C"], None));
        let record = parse_article(&selectors(), URL, &absent).unwrap();
        assert_eq!(record.publish_date, None);
    }

    #[test]
    fn test_fallback_selectors_for_another_template() {
        let html = Html::parse_document(
            r#"<article>
                 <h1>Otra plantilla</h1>
                 <time datetime="2022-11-02T08:00:00+00:00">2 nov</time>
                 <div class="entry-content"><p>Uno</p><p>Dos</p></div>
               </article>"#,
        );
        let record = parse_article(&selectors(), URL, &html).unwrap();
        assert_eq!(record.title, "Otra plantilla");
        assert_eq!(record.content, "Uno\nDos");
        assert_eq!(record.publish_date.as_deref(), Some("2022-11-02"));
    }

    #[test]
    fn test_custom_chain_order_is_respected() {
        let mut selectors = selectors();
        selectors.title = SelectorChain::new(
            Field::Title,
            vec![
                SelectorRule::attr("meta[property=\"og:title\"]", "content"),
                SelectorRule::text("h1"),
            ],
        )
        .unwrap();
        let html = Html::parse_document(
            r#"<head><meta property="og:title" content="Desde meta"></head>
               <h1>Desde h1</h1><div class="post-content"><p>C</p></div>"#,
        );
        let record = parse_article(&selectors, URL, &html).unwrap();
        assert_eq!(record.title, "Desde meta");
    }

    #[tokio::test]
    async fn test_extract_article_reports_fetch_failure() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, ScriptedTransport::status(410));
        let fetcher = fetcher(transport);
        let selectors = selectors();

        let err = Extractor::new(&fetcher, &selectors)
            .extract_article(URL)
            .await
            .unwrap_err();
        match err {
            ExtractError::Fetch { url, kind, .. } => {
                assert_eq!(url, URL);
                assert_eq!(kind, FailureKind::Permanent);
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert_eq!(fetcher.transport().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_extract_article_uses_canonical_source_url() {
        let transport = ScriptedTransport::new();
        transport.page(URL, article_page(Some("T"), &["C"], Some("May 14, 2023")));
        let fetcher = fetcher(transport);
        let selectors = selectors();

        let record = Extractor::new(&fetcher, &selectors)
            .extract_article(&format!("{URL}#comments"))
            .await
            .unwrap();
        assert_eq!(record.source_url, URL);
        assert_eq!(record.publish_date.as_deref(), Some("2023-05-14"));
    }
}

//! In-memory fixtures shared by the unit tests: a scripted [`Transport`] and
//! small HTML builders for listing and article pages.

use crate::fetch::{Fetcher, RawResponse, Transport, TransportError};
use crate::retry::{PolitenessDelay, RetryPolicy};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

type Scripted = Result<RawResponse, TransportError>;

/// Transport answering from per-URL scripts.
///
/// Each URL has a queue of responses consumed in order; the last one repeats
/// forever. Unknown URLs answer 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(status: u16) -> Scripted {
        Ok(RawResponse {
            status,
            final_url: None,
            body: String::new(),
        })
    }

    pub fn html(body: &str) -> Scripted {
        Ok(RawResponse {
            status: 200,
            final_url: None,
            body: body.to_string(),
        })
    }

    /// Queue `response` for `url`.
    pub fn respond(&self, url: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Serve `body` with status 200 for `url`.
    pub fn page(&self, url: &str, body: String) {
        self.respond(url, Self::html(&body));
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let key = url.to_string();
        self.calls.lock().unwrap().push(key.clone());
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Self::status(404),
        }
    }
}

pub fn fetcher(transport: ScriptedTransport) -> Fetcher<ScriptedTransport> {
    Fetcher::new(transport, RetryPolicy::immediate(2), PolitenessDelay::none())
}

/// A listing page linking `articles` with `a.post-link` and an optional
/// `a.next` pagination link.
pub fn listing_page(articles: &[&str], next: Option<&str>) -> String {
    let links: String = articles
        .iter()
        .map(|href| format!("<h2><a class=\"post-link\" href=\"{href}\">{href}</a></h2>\n"))
        .collect();
    let next = next
        .map(|href| format!("<nav><a class=\"next\" href=\"{href}\">Siguiente</a></nav>"))
        .unwrap_or_default();
    format!("<html><body><main>{links}</main>{next}</body></html>")
}

/// An article page in the default blog template.
pub fn article_page(title: Option<&str>, paragraphs: &[&str], date: Option<&str>) -> String {
    let title = title
        .map(|t| format!("<h1 class=\"entry-title\">{t}</h1>"))
        .unwrap_or_default();
    let date = date
        .map(|d| format!("<time class=\"post-date\">{d}</time>"))
        .unwrap_or_default();
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!(
        "<html><body><div class=\"post\">{title}{date}<div class=\"post-content\">{body}</div></div></body></html>"
    )
}

//! Polite, retried HTTP fetching.
//!
//! The [`Fetcher`] is the only place that talks to the network and the only
//! place that retries. Every call returns a [`FetchOutcome`]; nothing is
//! thrown, so the caller can always move on to the next page.
//!
//! # Architecture
//!
//! - [`Transport`]: one plain GET, no retries. [`ReqwestTransport`] is the
//!   production implementation; tests script their own.
//! - [`Fetcher`]: wraps a transport with the politeness delay and the
//!   [`RetryPolicy`], and parses successful bodies into HTML.
//!
//! # Classification
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | 2xx | `Success` |
//! | 5xx, connect error, timeout, body read error | retried, then `TransientFailure` |
//! | 4xx, other status, malformed or non-http URL | `PermanentFailure`, no retry |

use crate::retry::{PolitenessDelay, RetryPolicy};
use crate::utils::canonical_url;
use scraper::Html;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Status and body of one HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects, when the transport followed any.
    pub final_url: Option<String>,
    pub body: String,
}

/// Failure to obtain any response at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}

/// A single HTTP GET.
///
/// Implementations must not retry; retry policy belongs to [`Fetcher`].
pub trait Transport {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        let final_url = Some(resp.url().to_string());
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(e.to_string())
            }
        })?;
        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}

/// A successfully fetched and parsed page.
pub struct Document {
    /// Canonical URL the body was served from (after redirects).
    pub url: Url,
    pub html: Html,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("url", &self.url.as_str()).finish()
    }
}

/// Whether a failed fetch could succeed if tried again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// Result of one [`Fetcher::fetch`] call.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Document),
    /// Retries exhausted on network errors or 5xx responses.
    TransientFailure { attempts: usize, reason: String },
    /// Client error or unusable URL; never retried.
    PermanentFailure { reason: String },
}

impl FetchOutcome {
    /// Split into the document or the failure kind and reason.
    pub fn into_result(self) -> Result<Document, (FailureKind, String)> {
        match self {
            FetchOutcome::Success(doc) => Ok(doc),
            FetchOutcome::TransientFailure { attempts, reason } => Err((
                FailureKind::Transient,
                format!("{reason} (after {attempts} attempts)"),
            )),
            FetchOutcome::PermanentFailure { reason } => Err((FailureKind::Permanent, reason)),
        }
    }
}

/// Rate-limited, retried page fetcher.
pub struct Fetcher<T> {
    transport: T,
    retry: RetryPolicy,
    politeness: PolitenessDelay,
}

impl<T> fmt::Debug for Fetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .field("politeness", &self.politeness)
            .finish()
    }
}

impl<T> Fetcher<T>
where
    T: Transport,
{
    pub fn new(transport: T, retry: RetryPolicy, politeness: PolitenessDelay) -> Self {
        Self {
            transport,
            retry,
            politeness,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`, waiting the politeness delay before every attempt.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let Some(target) = canonical_url(url) else {
            warn!(%url, "Refusing to fetch malformed or non-http URL");
            return FetchOutcome::PermanentFailure {
                reason: format!("malformed or non-http url: {url:?}"),
            };
        };

        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            sleep(self.politeness.sample()).await;
            attempt += 1;
            let attempt_t0 = Instant::now();

            let failure = match self.transport.get(&target).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    let page_url = resp
                        .final_url
                        .as_deref()
                        .and_then(canonical_url)
                        .unwrap_or_else(|| target.clone());
                    debug!(
                        attempt,
                        status = resp.status,
                        bytes = resp.body.len(),
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        "Fetched page"
                    );
                    return FetchOutcome::Success(Document {
                        url: page_url,
                        html: Html::parse_document(&resp.body),
                    });
                }
                Ok(resp) if resp.status >= 500 => format!("HTTP {}", resp.status),
                Ok(resp) => {
                    warn!(status = resp.status, "Client error; not retrying");
                    return FetchOutcome::PermanentFailure {
                        reason: format!("HTTP {}", resp.status),
                    };
                }
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => {
                    warn!(error = %e, "Request could not be built; not retrying");
                    return FetchOutcome::PermanentFailure {
                        reason: e.to_string(),
                    };
                }
            };

            let total_dt = total_t0.elapsed();
            if !self.retry.should_retry(attempt) {
                error!(
                    attempt,
                    max = self.retry.max_attempts,
                    elapsed_ms_total = total_dt.as_millis() as u64,
                    error = %failure,
                    "fetch exhausted retries"
                );
                return FetchOutcome::TransientFailure {
                    attempts: attempt,
                    reason: failure,
                };
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                attempt,
                max = self.retry.max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                elapsed_ms_total = total_dt.as_millis() as u64,
                ?delay,
                error = %failure,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    fn fetcher(transport: ScriptedTransport, max_attempts: usize) -> Fetcher<ScriptedTransport> {
        Fetcher::new(
            transport,
            RetryPolicy::immediate(max_attempts),
            PolitenessDelay::none(),
        )
    }

    const URL: &str = "https://blog.example/post";

    #[tokio::test]
    async fn test_two_failures_then_success_uses_three_attempts() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, Err(TransportError::Connect("reset".into())));
        transport.respond(URL, ScriptedTransport::status(503));
        transport.respond(URL, ScriptedTransport::html("<h1>ok</h1>"));
        let fetcher = fetcher(transport, 3);

        let outcome = fetcher.fetch(URL).await;
        assert!(matches!(outcome, FetchOutcome::Success(_)));
        assert_eq!(fetcher.transport().calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_permanent_after_one_attempt() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, ScriptedTransport::status(404));
        let fetcher = fetcher(transport, 5);

        let outcome = fetcher.fetch(URL).await;
        match outcome {
            FetchOutcome::PermanentFailure { reason } => assert_eq!(reason, "HTTP 404"),
            other => panic!("expected permanent failure, got {other:?}"),
        }
        assert_eq!(fetcher.transport().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_transient_failure() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, Err(TransportError::Timeout));
        let fetcher = fetcher(transport, 3);

        match fetcher.fetch(URL).await {
            FetchOutcome::TransientFailure { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert_eq!(reason, "request timed out");
            }
            other => panic!("expected transient failure, got {other:?}"),
        }
        assert_eq!(fetcher.transport().calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_malformed_url_never_hits_the_network() {
        let fetcher = fetcher(ScriptedTransport::new(), 3);
        let outcome = fetcher.fetch("not a url").await;
        assert!(matches!(outcome, FetchOutcome::PermanentFailure { .. }));
        let outcome = fetcher.fetch("mailto:someone@blog.example").await;
        assert!(matches!(outcome, FetchOutcome::PermanentFailure { .. }));
        assert_eq!(fetcher.transport().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport.respond(URL, Err(TransportError::InvalidRequest("bad header".into())));
        let fetcher = fetcher(transport, 3);
        assert!(matches!(
            fetcher.fetch(URL).await,
            FetchOutcome::PermanentFailure { .. }
        ));
        assert_eq!(fetcher.transport().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_success_uses_redirect_target_as_document_url() {
        let transport = ScriptedTransport::new();
        transport.respond(
            URL,
            Ok(RawResponse {
                status: 200,
                final_url: Some("https://blog.example/post/#top".into()),
                body: "<p>hi</p>".into(),
            }),
        );
        let fetcher = fetcher(transport, 1);
        let doc = fetcher.fetch(URL).await.into_result().unwrap();
        assert_eq!(doc.url.as_str(), "https://blog.example/post/");
    }

    #[test]
    fn test_into_result_reports_kind() {
        let (kind, reason) = FetchOutcome::TransientFailure {
            attempts: 2,
            reason: "HTTP 502".into(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(kind, FailureKind::Transient);
        assert_eq!(reason, "HTTP 502 (after 2 attempts)");
    }
}

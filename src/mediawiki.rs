//! MediaWiki listing endpoint.
//!
//! Enumerates a wiki's pages with the `list=allpages` query module:
//!
//! ```text
//! GET <api_url>?action=query&list=allpages&apnamespace=0&aplimit=max&format=json[&apcontinue=<token>]
//! ```
//!
//! Each response carries one batch under `query.allpages[].title` and, when
//! more pages follow, a `continue.apcontinue` token (or, on pre-1.21 wikis,
//! `query-continue.allpages.apcontinue`). The token is passed back verbatim.
//!
//! # Configuration
//!
//! ```toml
//! [wiki]
//! api_url = "https://tolkiengateway.net/w/api.php"
//! namespace = 0
//! # batch_size = 500        # omitted → aplimit=max
//! request_delay_ms = 300    # pause between continuation requests
//! timeout_secs = 30
//!
//! [wiki.retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_delay_ms = 32000
//! ```
//!
//! # Failure mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | transport error / timeout (after retries) | `UpstreamUnavailable` |
//! | HTTP 429 or 5xx (after retries) | `UpstreamUnavailable` |
//! | API error `ratelimited` / `maxlag` (after retries) | `UpstreamUnavailable` |
//! | other non-2xx | `UpstreamUnavailable`, no retry |
//! | any other API `error` object | `UpstreamUnavailable`, no retry |
//! | body not JSON, no `query.allpages`, title not a string | `MalformedResponse` |
//! | `continue` without a non-empty string `apcontinue` | `MalformedContinuation` |

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::WikiConfig;
use crate::error::CrawlError;
use crate::models::{Continuation, ContinuationToken, ListPage, PageTitle};
use crate::retry::{is_retryable_status, RetryPolicy};
use crate::traits::ListingEndpoint;

/// API error codes that mean "slow down". MediaWiki sends them with HTTP 200.
const THROTTLE_CODES: &[&str] = &["ratelimited", "maxlag"];

/// [`ListingEndpoint`] backed by a MediaWiki `api.php`.
pub struct MediaWikiEndpoint {
    client: reqwest::Client,
    api_url: String,
    /// Host part of `api_url`, used as the endpoint name.
    host: String,
    namespace: i64,
    /// `aplimit` value: a number or `"max"`.
    limit: String,
    request_delay: Duration,
    retry: RetryPolicy,
}

impl MediaWikiEndpoint {
    /// Build an endpoint from the `[wiki]` configuration section.
    pub fn new(config: &WikiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            host: api_host(&config.api_url),
            namespace: config.namespace,
            limit: config
                .batch_size
                .map(|n| n.to_string())
                .unwrap_or_else(|| "max".to_string()),
            request_delay: Duration::from_millis(config.request_delay_ms),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    fn query_params(&self, token: Option<&ContinuationToken>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "allpages".to_string()),
            ("apnamespace", self.namespace.to_string()),
            ("aplimit", self.limit.clone()),
            ("format", "json".to_string()),
        ];
        if let Some(token) = token {
            params.push(("apcontinue", token.as_str().to_string()));
        }
        params
    }
}

#[async_trait]
impl ListingEndpoint for MediaWikiEndpoint {
    fn name(&self) -> &str {
        &self.host
    }

    async fn list_page(
        &self,
        token: Option<&ContinuationToken>,
    ) -> Result<ListPage, CrawlError> {
        // Be polite between continuation requests.
        if token.is_some() && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let params = self.query_params(token);
        let mut last_err = None;

        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.get(&self.api_url).query(&params).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.text().await.map_err(|e| {
                            CrawlError::UpstreamUnavailable(format!(
                                "failed to read response from {}: {}",
                                self.api_url, e
                            ))
                        })?;
                        let json = decode_json(&body)?;
                        if let Some(api_err) = ApiError::from_json(&json) {
                            if api_err.is_throttle() {
                                warn!(
                                    attempt = attempt + 1,
                                    code = %api_err.code,
                                    "allpages request throttled"
                                );
                                last_err = Some(api_err.into());
                                continue;
                            }
                            return Err(api_err.into());
                        }
                        let page = parse_allpages_json(&json)?;
                        debug!(
                            host = %self.host,
                            titles = page.titles.len(),
                            "allpages batch received"
                        );
                        return Ok(page);
                    }

                    let err = CrawlError::UpstreamUnavailable(format!(
                        "{} answered HTTP {}",
                        self.api_url, status
                    ));

                    // Rate limited or server error, retry
                    if is_retryable_status(status) {
                        warn!(attempt = attempt + 1, %status, "allpages request failed");
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "allpages request failed");
                    last_err = Some(CrawlError::UpstreamUnavailable(format!(
                        "request to {} failed: {}",
                        self.api_url, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CrawlError::UpstreamUnavailable("listing request was never attempted".to_string())
        }))
    }
}

/// An `error` object returned by `api.php`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub info: String,
}

impl ApiError {
    pub fn from_json(json: &Value) -> Option<Self> {
        let err = json.get("error")?;
        Some(Self {
            code: err
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("unknown")
                .to_string(),
            info: err
                .get("info")
                .and_then(|i| i.as_str())
                .unwrap_or("")
                .to_string(),
        })
    }

    /// Whether waiting and asking again can succeed.
    pub fn is_throttle(&self) -> bool {
        THROTTLE_CODES.contains(&self.code.as_str())
    }
}

impl From<ApiError> for CrawlError {
    fn from(err: ApiError) -> Self {
        CrawlError::UpstreamUnavailable(format!("API error {}: {}", err.code, err.info))
    }
}

fn decode_json(body: &str) -> Result<Value, CrawlError> {
    serde_json::from_str(body)
        .map_err(|e| CrawlError::MalformedResponse(format!("body is not JSON: {}", e)))
}

/// Decode one `list=allpages` JSON response.
pub fn parse_allpages_response(body: &str) -> Result<ListPage, CrawlError> {
    let json = decode_json(body)?;
    if let Some(err) = ApiError::from_json(&json) {
        return Err(err.into());
    }
    parse_allpages_json(&json)
}

fn parse_allpages_json(json: &Value) -> Result<ListPage, CrawlError> {
    let pages = json
        .get("query")
        .and_then(|q| q.get("allpages"))
        .and_then(|a| a.as_array())
        .ok_or_else(|| CrawlError::MalformedResponse("missing query.allpages array".to_string()))?;

    let mut titles = Vec::with_capacity(pages.len());
    for page in pages {
        let title = page.get("title").and_then(|t| t.as_str()).ok_or_else(|| {
            CrawlError::MalformedResponse(format!("allpages entry without a title: {}", page))
        })?;
        titles.push(PageTitle::new(title));
    }

    let next = match json.get("continue") {
        Some(cont) if !cont.is_null() => continuation_from(cont, "continue")?,
        _ => match json.get("query-continue").and_then(|qc| qc.get("allpages")) {
            Some(cont) => continuation_from(cont, "query-continue.allpages")?,
            None => Continuation::Done,
        },
    };

    Ok(ListPage { titles, next })
}

fn continuation_from(block: &Value, path: &str) -> Result<Continuation, CrawlError> {
    match block.get("apcontinue") {
        Some(Value::String(token)) if !token.is_empty() => {
            Ok(Continuation::More(ContinuationToken::new(token.clone())))
        }
        Some(other) => Err(CrawlError::MalformedContinuation(format!(
            "{}.apcontinue is not a non-empty string: {}",
            path, other
        ))),
        None => Err(CrawlError::MalformedContinuation(format!(
            "{} block has no apcontinue: {}",
            path, block
        ))),
    }
}

/// Host part of an http(s) URL, e.g. `tolkiengateway.net`.
fn api_host(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

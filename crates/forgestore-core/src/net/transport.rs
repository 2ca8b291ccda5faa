//! Per-provider HTTP transport
//!
//! Wraps a configured `reqwest::Client` with the provider's base URL and
//! default headers, injects the bearer token at request time (so a refresh
//! is picked up immediately), applies the provider's retry rules, and feeds
//! every response's rate-limit headers into the shared tracker - including
//! responses that end up retried or discarded.
//!
//! Non-2xx responses are returned as ordinary values; classification into
//! the error taxonomy happens one layer up, in `safe_api_call`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::auth::TokenSession;
use crate::error::{ApiError, Result};
use crate::models::Provider;
use crate::net::ratelimit::RateLimitTracker;

const USER_AGENT_VALUE: &str = "Forgestore/0.4";
const GITHUB_API_VERSION: &str = "2022-11-28";

// ============================================================================
// Response value
// ============================================================================

/// A fully-read HTTP response
///
/// Status and headers are always present; deserialization is the caller's
/// decision so non-2xx bodies can be inspected too.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::decode(e.to_string()))
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| ApiError::decode(format!("Response body is not UTF-8: {}", e)))
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (0-based), jittered +/-10%
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff);
        let jitter = rand::thread_rng().gen_range(0.9..1.1);
        base.mul_f64(jitter)
    }
}

/// Provider-specific decision on whether a response status warrants a retry
///
/// GitHub reports quota exhaustion as 403, so a 403 is retried only when the
/// remaining-quota header proves it is NOT exhaustion (absent header or a
/// value above zero - e.g. secondary abuse throttling). GitLab uses 429 for
/// throttling, which is always retryable. Server errors retry on both.
pub fn should_retry_status(provider: Provider, status: StatusCode, headers: &HeaderMap) -> bool {
    let code = status.as_u16();
    if (500..600).contains(&code) {
        return true;
    }
    match provider {
        Provider::GitHub => {
            if code == 403 {
                let remaining = headers
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok());
                return match remaining {
                    None => true,
                    Some(n) => n > 0,
                };
            }
            false
        }
        Provider::GitLab => code == 429,
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Request issuer bound to one provider
pub struct ApiTransport {
    provider: Provider,
    client: reqwest::Client,
    base_url: String,
    session: Arc<TokenSession>,
    tracker: Arc<RateLimitTracker>,
    retry: RetryPolicy,
}

impl ApiTransport {
    pub fn new(
        provider: Provider,
        session: Arc<TokenSession>,
        tracker: Arc<RateLimitTracker>,
    ) -> Result<Self> {
        Self::with_base_url(provider, provider.api_base_url(), session, tracker)
    }

    pub fn with_base_url(
        provider: Provider,
        base_url: impl Into<String>,
        session: Arc<TokenSession>,
        tracker: Arc<RateLimitTracker>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT_VALUE)
            .default_headers(default_headers(provider))
            .build()
            .map_err(|e| ApiError::config(format!("Could not build HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            tracker,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    /// Issue a GET and return the response as a value, retrying per policy
    ///
    /// `path` may be relative to the provider's base URL or a full URL (raw
    /// content hosts live outside the API origin).
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        let mut attempt = 0u32;
        loop {
            let result = self.send_once(&url, query).await;

            match result {
                Ok(response) => {
                    // Quota headers are recorded even for responses we are
                    // about to retry or hand back as failures.
                    self.tracker
                        .record_from_headers(&response.headers, self.provider);

                    let retryable =
                        should_retry_status(self.provider, response.status, &response.headers);
                    if retryable && attempt + 1 < self.retry.max_attempts {
                        log::debug!(
                            "[net:transport] {} {} -> {}, retrying (attempt {})",
                            self.provider,
                            url,
                            response.status,
                            attempt + 1
                        );
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    log::debug!(
                        "[net:transport] {} {} failed: {}, retrying (attempt {})",
                        self.provider,
                        url,
                        e,
                        attempt + 1
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }

        // Token injection happens per attempt so a refresh mid-retry is
        // reflected immediately.
        if let Some(token) = self.session.current() {
            let bearer = token.access_token.trim();
            if !bearer.is_empty() {
                request = request.header(AUTHORIZATION, format!("Bearer {}", bearer));
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn default_headers(provider: Provider) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match provider {
        Provider::GitHub => {
            headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
            headers.insert(
                "X-GitHub-Api-Version",
                HeaderValue::from_static(GITHUB_API_VERSION),
            );
        }
        Provider::GitLab => {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
    }
    headers
}

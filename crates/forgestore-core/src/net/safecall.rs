//! Uniform request wrapper
//!
//! `safe_api_call` turns any single request into a `Result` that callers can
//! rely on: it short-circuits when the provider is already rate limited,
//! re-checks the response for fresh exhaustion, and maps every other outcome
//! (auth failure, HTTP error, decode error, network error) into the error
//! taxonomy. It never panics.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};
use crate::models::Provider;
use crate::net::ratelimit::{RateLimitSnapshot, RateLimitTracker};
use crate::net::transport::ApiResponse;

/// Extra wait added on top of the reported reset time before retrying
const RESET_GRACE: Duration = Duration::from_secs(1);

/// Execute one request and decode the 2xx body as JSON
pub async fn safe_api_call<T, F, Fut>(
    tracker: &RateLimitTracker,
    provider: Provider,
    auto_retry_on_rate_limit: bool,
    request_fn: F,
) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    let response = safe_api_call_raw(tracker, provider, auto_retry_on_rate_limit, request_fn).await?;
    response.json()
}

/// Execute one request and return the 2xx body as text (raw README fetches)
pub async fn safe_api_call_text<F, Fut>(
    tracker: &RateLimitTracker,
    provider: Provider,
    auto_retry_on_rate_limit: bool,
    request_fn: F,
) -> Result<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    let response = safe_api_call_raw(tracker, provider, auto_retry_on_rate_limit, request_fn).await?;
    response.text()
}

async fn safe_api_call_raw<F, Fut>(
    tracker: &RateLimitTracker,
    provider: Provider,
    auto_retry_on_rate_limit: bool,
    request_fn: F,
) -> Result<ApiResponse>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    // Step 1: no network call while the quota is known-exhausted
    if tracker.is_blocked(provider) {
        if auto_retry_on_rate_limit {
            let wait = tracker.time_until_reset(provider) + RESET_GRACE;
            log::debug!(
                "[net:safecall] Rate limited on {}, waiting {:?} before retry",
                provider,
                wait
            );
            tokio::time::sleep(wait).await;
        } else if let Some(snapshot) = tracker.current(provider) {
            return Err(ApiError::RateLimitExceeded { snapshot });
        }
    }

    // Step 2: execute; transport errors are already normalized Results
    let response = request_fn().await?;

    // Step 3: fresh headers may report exhaustion this very response caused
    tracker.record_from_headers(&response.headers, provider);
    if is_rate_limit_status(provider, response.status.as_u16()) {
        if let Some(snapshot) = RateLimitSnapshot::from_headers(&response.headers, provider) {
            if snapshot.is_exhausted() {
                return Err(ApiError::RateLimitExceeded { snapshot });
            }
        }
    }

    // Steps 4-6: uniform outcome mapping
    if response.status.is_success() {
        return Ok(response);
    }
    if response.status.as_u16() == 401 && provider == Provider::GitLab {
        return Err(ApiError::AuthRequired(provider));
    }
    Err(ApiError::Http {
        status: response.status.as_u16(),
        description: response
            .status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    })
}

fn is_rate_limit_status(provider: Provider, status: u16) -> bool {
    match provider {
        Provider::GitHub => status == 403,
        Provider::GitLab => status == 429,
    }
}

//! Rate-limit tracking
//!
//! Each provider reports its remaining quota in response headers (GitHub
//! `X-RateLimit-*`, GitLab `RateLimit-*`). The tracker keeps the last
//! observed snapshot per provider so callers can short-circuit requests that
//! would burn a blocked quota.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::models::Provider;

// ============================================================================
// Snapshot
// ============================================================================

/// Last known quota state reported by a provider
///
/// Replaced wholesale on every response that carries rate-limit headers;
/// there is no history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub resource: String,
    pub provider: Provider,
}

impl RateLimitSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time left until the quota window resets; zero if already past
    pub fn time_until_reset(&self) -> Duration {
        let millis = (self.reset_at - Utc::now()).num_milliseconds();
        Duration::from_millis(millis.max(0) as u64)
    }

    /// Parse a snapshot out of response headers
    ///
    /// Returns `None` when any required header is absent or malformed; a
    /// response without quota headers is not an error.
    pub fn from_headers(headers: &HeaderMap, provider: Provider) -> Option<Self> {
        match provider {
            Provider::GitHub => Self::from_named_headers(
                headers,
                provider,
                "x-ratelimit-limit",
                "x-ratelimit-remaining",
                "x-ratelimit-reset",
                header_str(headers, "x-ratelimit-resource").unwrap_or("core"),
            ),
            Provider::GitLab => Self::from_named_headers(
                headers,
                provider,
                "ratelimit-limit",
                "ratelimit-remaining",
                "ratelimit-reset",
                "api",
            ),
        }
    }

    fn from_named_headers(
        headers: &HeaderMap,
        provider: Provider,
        limit_name: &str,
        remaining_name: &str,
        reset_name: &str,
        resource: &str,
    ) -> Option<Self> {
        let limit: i64 = header_str(headers, limit_name)?.parse().ok()?;
        let remaining: i64 = header_str(headers, remaining_name)?.parse().ok()?;
        let reset_epoch: i64 = header_str(headers, reset_name)?.parse().ok()?;
        let reset_at = Utc.timestamp_opt(reset_epoch, 0).single()?;

        Some(Self {
            limit,
            remaining,
            reset_at,
            resource: resource.to_string(),
            provider,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Tracker
// ============================================================================

/// Per-provider in-memory record of the last observed quota
///
/// Shared by every in-flight request; all mutation goes through one lock.
/// Process lifetime only - nothing is persisted.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    snapshots: Mutex<HashMap<Provider, RateLimitSnapshot>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored snapshot for the snapshot's provider
    pub fn record(&self, snapshot: RateLimitSnapshot) {
        let mut map = self.snapshots.lock().expect("rate limit lock poisoned");
        map.insert(snapshot.provider, snapshot);
    }

    /// Parse headers and record the snapshot if one is present
    pub fn record_from_headers(&self, headers: &HeaderMap, provider: Provider) {
        if let Some(snapshot) = RateLimitSnapshot::from_headers(headers, provider) {
            self.record(snapshot);
        }
    }

    /// True iff a snapshot exists, is exhausted, and its reset is still ahead
    pub fn is_blocked(&self, provider: Provider) -> bool {
        let map = self.snapshots.lock().expect("rate limit lock poisoned");
        match map.get(&provider) {
            Some(info) if info.is_exhausted() => info.time_until_reset() > Duration::ZERO,
            _ => false,
        }
    }

    /// Time until the provider's quota resets; zero if unknown or already past
    pub fn time_until_reset(&self, provider: Provider) -> Duration {
        let map = self.snapshots.lock().expect("rate limit lock poisoned");
        map.get(&provider)
            .map(|info| info.time_until_reset())
            .unwrap_or(Duration::ZERO)
    }

    /// Last recorded snapshot for the provider, if any
    pub fn current(&self, provider: Provider) -> Option<RateLimitSnapshot> {
        let map = self.snapshots.lock().expect("rate limit lock poisoned");
        map.get(&provider).cloned()
    }

    /// Drop the provider's snapshot (called on successful authentication -
    /// authenticated quotas are a different budget)
    pub fn clear(&self, provider: Provider) {
        let mut map = self.snapshots.lock().expect("rate limit lock poisoned");
        map.remove(&provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers_of(pairs: &[(&str, String)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    fn github_headers(remaining: i64, reset_in_secs: i64) -> HeaderMap {
        let reset = (Utc::now() + ChronoDuration::seconds(reset_in_secs)).timestamp();
        headers_of(&[
            ("x-ratelimit-limit", "60".to_string()),
            ("x-ratelimit-remaining", remaining.to_string()),
            ("x-ratelimit-reset", reset.to_string()),
            ("x-ratelimit-resource", "search".to_string()),
        ])
    }

    #[test]
    fn test_parse_github_headers() {
        let snapshot =
            RateLimitSnapshot::from_headers(&github_headers(42, 60), Provider::GitHub).unwrap();
        assert_eq!(snapshot.limit, 60);
        assert_eq!(snapshot.remaining, 42);
        assert_eq!(snapshot.resource, "search");
        assert_eq!(snapshot.provider, Provider::GitHub);
        assert!(!snapshot.is_exhausted());
    }

    #[test]
    fn test_parse_gitlab_headers() {
        let reset = (Utc::now() + ChronoDuration::seconds(30)).timestamp();
        let headers = headers_of(&[
            ("ratelimit-limit", "2000".to_string()),
            ("ratelimit-remaining", "0".to_string()),
            ("ratelimit-reset", reset.to_string()),
        ]);
        let snapshot = RateLimitSnapshot::from_headers(&headers, Provider::GitLab).unwrap();
        assert_eq!(snapshot.resource, "api");
        assert!(snapshot.is_exhausted());
    }

    #[test]
    fn test_parse_missing_or_malformed_headers() {
        assert!(RateLimitSnapshot::from_headers(&HeaderMap::new(), Provider::GitHub).is_none());

        let headers = headers_of(&[
            ("x-ratelimit-limit", "sixty".to_string()),
            ("x-ratelimit-remaining", "1".to_string()),
            ("x-ratelimit-reset", "123".to_string()),
        ]);
        assert!(RateLimitSnapshot::from_headers(&headers, Provider::GitHub).is_none());

        // GitHub headers on a GitLab response do not parse
        assert!(
            RateLimitSnapshot::from_headers(&github_headers(1, 60), Provider::GitLab).is_none()
        );
    }

    #[test]
    fn test_blocked_iff_exhausted_and_reset_ahead() {
        let tracker = RateLimitTracker::new();
        assert!(!tracker.is_blocked(Provider::GitHub));

        tracker.record_from_headers(&github_headers(5, 60), Provider::GitHub);
        assert!(!tracker.is_blocked(Provider::GitHub));

        tracker.record_from_headers(&github_headers(0, 60), Provider::GitHub);
        assert!(tracker.is_blocked(Provider::GitHub));
        assert!(tracker.time_until_reset(Provider::GitHub) > Duration::ZERO);

        // Exhausted but the window has already passed
        tracker.record_from_headers(&github_headers(0, -5), Provider::GitHub);
        assert!(!tracker.is_blocked(Provider::GitHub));
        assert_eq!(tracker.time_until_reset(Provider::GitHub), Duration::ZERO);
    }

    #[test]
    fn test_providers_tracked_independently() {
        let tracker = RateLimitTracker::new();
        tracker.record_from_headers(&github_headers(0, 120), Provider::GitHub);
        assert!(tracker.is_blocked(Provider::GitHub));
        assert!(!tracker.is_blocked(Provider::GitLab));
    }

    #[test]
    fn test_clear_unblocks() {
        let tracker = RateLimitTracker::new();
        tracker.record_from_headers(&github_headers(0, 120), Provider::GitHub);
        assert!(tracker.is_blocked(Provider::GitHub));

        tracker.clear(Provider::GitHub);
        assert!(!tracker.is_blocked(Provider::GitHub));
        assert!(tracker.current(Provider::GitHub).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let tracker = RateLimitTracker::new();
        tracker.record_from_headers(&github_headers(10, 60), Provider::GitHub);
        tracker.record_from_headers(&github_headers(9, 60), Provider::GitHub);
        assert_eq!(tracker.current(Provider::GitHub).unwrap().remaining, 9);
    }
}

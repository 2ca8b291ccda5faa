//! OAuth token refresh
//!
//! Only GitLab issues expiring tokens; its refresh grant goes straight to the
//! OAuth endpoint, outside the rate-limited API transport.

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::token::Token;
use crate::config::OAuthConfig;
use crate::error::{ApiError, Result};
use crate::models::Provider;

/// Exchanges a refresh token for a fresh access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, provider: Provider, refresh_token: &str) -> Result<Token>;
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Refresher hitting the provider's `/oauth/token` endpoint
pub struct OAuthTokenRefresher {
    http: reqwest::Client,
    config: OAuthConfig,
    gitlab_base_url: String,
}

impl OAuthTokenRefresher {
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_base_url(config, Provider::GitLab.oauth_base_url())
    }

    /// Point the refresher at a non-default GitLab host (self-managed, tests)
    pub fn with_base_url(config: OAuthConfig, gitlab_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            gitlab_base_url: gitlab_base_url.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuthTokenRefresher {
    async fn refresh(&self, provider: Provider, refresh_token: &str) -> Result<Token> {
        if provider == Provider::GitHub {
            // GitHub device-flow tokens do not expire
            return Err(ApiError::RefreshFailed(
                "GitHub tokens do not support refresh".to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/oauth/token", self.gitlab_base_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.gitlab_client_id),
                ("client_secret", &self.config.gitlab_client_secret),
            ])
            .send()
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RefreshFailed(format!(
                "Token refresh failed: HTTP {}",
                status.as_u16()
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::RefreshFailed(format!("Malformed refresh response: {}", e)))?;

        Ok(Token::expiring(
            Provider::GitLab,
            body.access_token,
            body.refresh_token,
            body.expires_in.unwrap_or(7200),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_github_refresh_is_rejected() {
        let refresher = OAuthTokenRefresher::new(OAuthConfig::new("a", "b", "c"));
        let err = refresher
            .refresh(Provider::GitHub, "irrelevant")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed(_)));
    }

    #[test]
    fn test_refresh_response_parsing() {
        let body = r#"{
            "access_token": "new-token",
            "token_type": "Bearer",
            "refresh_token": "new-refresh",
            "expires_in": 7200,
            "created_at": 1700000000
        }"#;
        let parsed: RefreshResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "new-token");
        assert_eq!(parsed.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(parsed.expires_in, Some(7200));
    }
}

//! OAuth2 Device Authorization Grant
//!
//! Both providers implement RFC 8628 with different endpoints and error
//! envelopes. The client here normalizes them: `start_device_flow` returns
//! the user-facing code/URL pair, and `poll_device_token` performs a single
//! poll attempt - the caller owns the poll loop and its cadence.

use std::time::Duration;

use serde::Deserialize;

use crate::auth::token::Token;
use crate::error::{ApiError, Result};
use crate::models::Provider;

/// Default GitHub device-flow scopes
pub const GITHUB_DEFAULT_SCOPES: &str = "read:user";

/// Default GitLab device-flow scopes
pub const GITLAB_DEFAULT_SCOPES: &str = "read_user api read_repository write_repository";

const START_FLOW_ATTEMPTS: u32 = 3;
const START_FLOW_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const START_FLOW_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Everything needed to walk a user through one authentication attempt
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceFlowStart {
    pub user_code: String,
    pub verification_uri: String,
    pub device_code: String,
    pub expires_in: u64,
    /// Minimum seconds between poll attempts
    #[serde(rename = "interval", default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Outcome of a single token poll
#[derive(Debug, Clone)]
pub enum DevicePoll {
    /// The user approved the device; a token was issued
    Authorized(Token),
    /// The user has not acted yet - poll again after the interval
    Pending,
    /// The provider asked for a slower cadence - back the interval off
    SlowDown,
}

#[derive(Debug, Deserialize)]
struct TokenSuccessBody {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn message(&self) -> String {
        match self.error_description {
            Some(ref desc) if !desc.trim().is_empty() => {
                format!("{}: {}", self.error, desc.trim())
            }
            _ => self.error.clone(),
        }
    }
}

/// Device-flow client bound to one provider
pub struct DeviceAuthClient {
    provider: Provider,
    http: reqwest::Client,
    base_url: String,
}

impl DeviceAuthClient {
    pub fn new(provider: Provider) -> Self {
        Self::with_base_url(provider, provider.oauth_base_url())
    }

    /// Point the client at a non-default host (self-managed GitLab, tests)
    pub fn with_base_url(provider: Provider, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .user_agent("Forgestore/0.4 (DeviceFlow)")
            .build()
            .unwrap_or_default();
        Self {
            provider,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Default scopes for this provider's flow
    pub fn default_scopes(&self) -> &'static str {
        match self.provider {
            Provider::GitHub => GITHUB_DEFAULT_SCOPES,
            Provider::GitLab => GITLAB_DEFAULT_SCOPES,
        }
    }

    fn authorize_endpoint(&self) -> String {
        match self.provider {
            Provider::GitHub => format!("{}/login/device/code", self.base_url),
            Provider::GitLab => format!("{}/oauth/authorize_device", self.base_url),
        }
    }

    fn token_endpoint(&self) -> String {
        match self.provider {
            Provider::GitHub => format!("{}/login/oauth/access_token", self.base_url),
            Provider::GitLab => format!("{}/oauth/token", self.base_url),
        }
    }

    /// Request a device/user code pair from the provider
    ///
    /// Transient (network-level) failures are retried up to three attempts
    /// with exponential backoff; a non-2xx status or malformed body is a
    /// hard failure.
    pub async fn start_device_flow(
        &self,
        client_id: &str,
        scopes: &str,
    ) -> Result<DeviceFlowStart> {
        let mut backoff = START_FLOW_INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.request_device_code(client_id, scopes).await {
                Ok(start) => return Ok(start),
                Err(e) if e.is_transient() && attempt < START_FLOW_ATTEMPTS => {
                    log::error!(
                        "[auth:device] start_device_flow attempt {} failed: {}",
                        attempt,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(START_FLOW_MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_device_code(&self, client_id: &str, scopes: &str) -> Result<DeviceFlowStart> {
        let response = self
            .http
            .post(self.authorize_endpoint())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("client_id", client_id), ("scope", scopes)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                description: format!(
                    "{} device authorization failed. Body: {}",
                    self.provider,
                    excerpt(&text)
                ),
            });
        }

        match serde_json::from_str::<DeviceFlowStart>(&text) {
            Ok(start) => Ok(start),
            Err(_) => match serde_json::from_str::<TokenErrorBody>(&text) {
                Ok(err) => Err(ApiError::Http {
                    status: status.as_u16(),
                    description: err.message(),
                }),
                Err(_) => Err(ApiError::decode(format!(
                    "Unexpected response from {}: {}",
                    self.provider,
                    excerpt(&text)
                ))),
            },
        }
    }

    /// One poll of the token endpoint
    ///
    /// `authorization_pending` and `slow_down` come back as continuation
    /// signals; any other provider error is a failure carrying the
    /// provider's `error` and `error_description` joined into one message.
    /// Network failures are returned as-is - the caller decides whether to
    /// keep polling.
    pub async fn poll_device_token(&self, client_id: &str, device_code: &str) -> Result<DevicePoll> {
        let response = self
            .http
            .post(self.token_endpoint())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", client_id),
                ("device_code", device_code),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // GitHub answers 200 with an error body while authorization is
        // pending; GitLab uses 400 for the same states. Try both shapes
        // before deciding on the status code.
        if let Ok(success) = serde_json::from_str::<TokenSuccessBody>(&text) {
            return Ok(DevicePoll::Authorized(self.token_from(success)));
        }

        if let Ok(err) = serde_json::from_str::<TokenErrorBody>(&text) {
            return match err.error.as_str() {
                "authorization_pending" => Ok(DevicePoll::Pending),
                "slow_down" => Ok(DevicePoll::SlowDown),
                _ => Err(ApiError::Http {
                    status: status.as_u16(),
                    description: err.message(),
                }),
            };
        }

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                description: format!("{} token poll failed", self.provider),
            });
        }

        Err(ApiError::decode(format!(
            "Unexpected response from {}: {}",
            self.provider,
            excerpt(&text)
        )))
    }

    fn token_from(&self, body: TokenSuccessBody) -> Token {
        match self.provider {
            Provider::GitHub => Token::permanent(Provider::GitHub, body.access_token),
            Provider::GitLab => Token::expiring(
                Provider::GitLab,
                body.access_token,
                body.refresh_token,
                body.expires_in.unwrap_or(7200),
            ),
        }
    }
}

fn excerpt(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(300)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_start_parsing() {
        let body = r#"{
            "device_code": "dc-123",
            "user_code": "ABCD-1234",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 900,
            "interval": 5
        }"#;
        let start: DeviceFlowStart = serde_json::from_str(body).unwrap();
        assert_eq!(start.user_code, "ABCD-1234");
        assert_eq!(start.device_code, "dc-123");
        assert_eq!(start.poll_interval, 5);
    }

    #[test]
    fn test_device_start_default_interval() {
        let body = r#"{
            "device_code": "dc",
            "user_code": "UC",
            "verification_uri": "https://gitlab.com/oauth/device",
            "expires_in": 300
        }"#;
        let start: DeviceFlowStart = serde_json::from_str(body).unwrap();
        assert_eq!(start.poll_interval, 5);
    }

    #[test]
    fn test_error_body_message_joins_description() {
        let err: TokenErrorBody = serde_json::from_str(
            r#"{"error": "access_denied", "error_description": "The user denied the request"}"#,
        )
        .unwrap();
        assert_eq!(err.message(), "access_denied: The user denied the request");

        let bare: TokenErrorBody = serde_json::from_str(r#"{"error": "expired_token"}"#).unwrap();
        assert_eq!(bare.message(), "expired_token");
    }

    #[test]
    fn test_endpoints_per_provider() {
        let github = DeviceAuthClient::new(Provider::GitHub);
        assert_eq!(
            github.authorize_endpoint(),
            "https://github.com/login/device/code"
        );
        assert_eq!(
            github.token_endpoint(),
            "https://github.com/login/oauth/access_token"
        );

        let gitlab = DeviceAuthClient::new(Provider::GitLab);
        assert_eq!(
            gitlab.authorize_endpoint(),
            "https://gitlab.com/oauth/authorize_device"
        );
        assert_eq!(gitlab.token_endpoint(), "https://gitlab.com/oauth/token");
    }

    #[test]
    fn test_default_scopes() {
        assert_eq!(
            DeviceAuthClient::new(Provider::GitHub).default_scopes(),
            GITHUB_DEFAULT_SCOPES
        );
        assert_eq!(
            DeviceAuthClient::new(Provider::GitLab).default_scopes(),
            GITLAB_DEFAULT_SCOPES
        );
    }

    #[test]
    fn test_excerpt_bounds() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 300);
        assert_eq!(excerpt("short"), "short");
    }
}

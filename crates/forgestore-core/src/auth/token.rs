//! OAuth token model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Provider;

/// Lead window before expiry at which a token counts as expiring
const EXPIRY_LEAD_MINUTES: i64 = 5;

/// An OAuth access token for one provider
///
/// GitHub device-flow tokens never expire (`expires_at` is `None`); GitLab
/// tokens expire and carry a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Non-expiring token (GitHub)
    pub fn permanent(provider: Provider, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            provider,
            created_at: Utc::now(),
        }
    }

    /// Expiring token (GitLab), with lifetime in seconds from now
    pub fn expiring(
        provider: Provider,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Some(now + Duration::seconds(expires_in_secs)),
            provider,
            created_at: now,
        }
    }

    /// True when the token has expired or will within the lead window
    ///
    /// A token without an expiry never reports true.
    pub fn is_expiring_soon(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Utc::now() < Duration::minutes(EXPIRY_LEAD_MINUTES),
            None => false,
        }
    }
}

//! OAuth application configuration
//!
//! Client ids/secrets are build-environment concerns; they are read from the
//! environment once at construction and treated as opaque strings after that.

use crate::error::{ApiError, Result};
use crate::models::Provider;

/// Environment variable holding the GitHub OAuth app client id
pub const GITHUB_CLIENT_ID_VAR: &str = "FORGESTORE_GITHUB_CLIENT_ID";

/// Environment variable holding the GitLab OAuth app client id
pub const GITLAB_CLIENT_ID_VAR: &str = "FORGESTORE_GITLAB_CLIENT_ID";

/// Environment variable holding the GitLab OAuth app client secret
pub const GITLAB_CLIENT_SECRET_VAR: &str = "FORGESTORE_GITLAB_CLIENT_SECRET";

/// OAuth client credentials for both providers
///
/// GitHub's device flow needs only a client id; GitLab's refresh grant also
/// needs the client secret.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub github_client_id: String,
    pub gitlab_client_id: String,
    pub gitlab_client_secret: String,
}

impl OAuthConfig {
    pub fn new(
        github_client_id: impl Into<String>,
        gitlab_client_id: impl Into<String>,
        gitlab_client_secret: impl Into<String>,
    ) -> Self {
        Self {
            github_client_id: github_client_id.into(),
            gitlab_client_id: gitlab_client_id.into(),
            gitlab_client_secret: gitlab_client_secret.into(),
        }
    }

    /// Read credentials from the environment
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            github_client_id: require_var(GITHUB_CLIENT_ID_VAR)?,
            gitlab_client_id: require_var(GITLAB_CLIENT_ID_VAR)?,
            gitlab_client_secret: require_var(GITLAB_CLIENT_SECRET_VAR)?,
        })
    }

    /// Client id for the given provider's device flow
    pub fn client_id(&self, provider: Provider) -> &str {
        match provider {
            Provider::GitHub => &self.github_client_id,
            Provider::GitLab => &self.gitlab_client_id,
        }
    }
}

fn require_var(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::config(format!(
            "{} environment variable not set",
            name
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_lookup() {
        let config = OAuthConfig::new("gh-id", "gl-id", "gl-secret");
        assert_eq!(config.client_id(Provider::GitHub), "gh-id");
        assert_eq!(config.client_id(Provider::GitLab), "gl-id");
    }

    #[test]
    fn test_missing_var_is_config_error() {
        let err = require_var("FORGESTORE_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
        assert!(err.to_string().contains("FORGESTORE_TEST_UNSET_VARIABLE"));
    }
}

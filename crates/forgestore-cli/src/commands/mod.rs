//! CLI command implementations

pub mod auth;
pub mod browse;
pub mod details;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_stream::StreamExt;

use forgestore_core::{
    AppStateManager, FileTokenStore, ForgeClient, GithubClient, GitlabClient, OAuthConfig,
    OAuthTokenRefresher, Provider, RateLimitTracker, TargetPlatform, TokenSession,
};

use crate::output::OutputFormat;

/// Shared context passed to every command
pub struct Context {
    pub state: Arc<AppStateManager>,
    pub config: OAuthConfig,
    pub format: OutputFormat,
    pub quiet: bool,
    pub provider: Provider,
    pub platform: TargetPlatform,
}

impl Context {
    /// Wire up token stores, sessions, and the app-state manager
    pub fn new(
        format: OutputFormat,
        quiet: bool,
        provider: Provider,
        platform: TargetPlatform,
    ) -> Result<Self> {
        // Missing OAuth configuration only blocks `login`; browsing GitHub
        // anonymously works without it.
        let config = OAuthConfig::from_env().unwrap_or_else(|e| {
            log::debug!("OAuth config not available: {}", e);
            OAuthConfig::new("", "", "")
        });

        let store = Arc::new(FileTokenStore::new()?);
        let refresher = Arc::new(OAuthTokenRefresher::new(config.clone()));
        let github_session = Arc::new(TokenSession::new(
            Provider::GitHub,
            store.clone(),
            refresher.clone(),
        ));
        let gitlab_session = Arc::new(TokenSession::new(Provider::GitLab, store, refresher));

        let state = AppStateManager::new(
            Arc::new(RateLimitTracker::new()),
            github_session,
            gitlab_session,
        );

        Ok(Self {
            state,
            config,
            format,
            quiet,
            provider,
            platform,
        })
    }

    /// Load persisted tokens and wait for the app state to reflect them
    pub async fn hydrate(&self) -> Result<()> {
        for provider in [Provider::GitHub, Provider::GitLab] {
            let token = self.state.session(provider).reload_from_store().await;
            if token.is_some() {
                // The session watcher applies the auth flag asynchronously
                let mut watch = self.state.watch();
                let deadline = tokio::time::timeout(Duration::from_secs(2), async {
                    while let Some(snapshot) = watch.next().await {
                        if snapshot.is_authenticated(provider) {
                            break;
                        }
                    }
                });
                deadline.await.ok();
            }
        }
        Ok(())
    }

    /// Provider client for the selected provider
    pub fn client(&self) -> Result<Arc<dyn ForgeClient>> {
        Ok(match self.provider {
            Provider::GitHub => Arc::new(GithubClient::new(self.state.clone())?),
            Provider::GitLab => Arc::new(GitlabClient::new(self.state.clone())?),
        })
    }
}

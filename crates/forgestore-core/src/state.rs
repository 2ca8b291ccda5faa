//! Shared application state side channel
//!
//! Rate-limit exhaustion and "please authenticate" conditions are not part
//! of any one request's result - they are app-wide conditions every surface
//! (CLI, future GUI shells) reacts to. The manager owns the tracker and both
//! token sessions, mirrors their condition into one observable `AppState`,
//! and lets call sites raise the auth prompt.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::auth::TokenSession;
use crate::models::Provider;
use crate::net::ratelimit::{RateLimitSnapshot, RateLimitTracker};

/// Snapshot of app-wide API conditions
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub github_rate_limit: Option<RateLimitSnapshot>,
    pub gitlab_rate_limit: Option<RateLimitSnapshot>,
    pub github_authenticated: bool,
    pub gitlab_authenticated: bool,
    /// Set when some operation needs the user to sign in to this provider
    pub auth_prompt: Option<Provider>,
}

impl AppState {
    pub fn rate_limit(&self, provider: Provider) -> Option<&RateLimitSnapshot> {
        match provider {
            Provider::GitHub => self.github_rate_limit.as_ref(),
            Provider::GitLab => self.gitlab_rate_limit.as_ref(),
        }
    }

    pub fn is_authenticated(&self, provider: Provider) -> bool {
        match provider {
            Provider::GitHub => self.github_authenticated,
            Provider::GitLab => self.gitlab_authenticated,
        }
    }
}

pub struct AppStateManager {
    tracker: Arc<RateLimitTracker>,
    github_session: Arc<TokenSession>,
    gitlab_session: Arc<TokenSession>,
    state: watch::Sender<AppState>,
}

impl AppStateManager {
    /// Build the manager and start mirroring token changes into `AppState`
    ///
    /// Must be called from within a tokio runtime; two watcher tasks are
    /// spawned, one per provider session.
    pub fn new(
        tracker: Arc<RateLimitTracker>,
        github_session: Arc<TokenSession>,
        gitlab_session: Arc<TokenSession>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AppState::default());
        let manager = Arc::new(Self {
            tracker,
            github_session,
            gitlab_session,
            state,
        });

        manager.spawn_session_watcher(Provider::GitHub);
        manager.spawn_session_watcher(Provider::GitLab);
        manager
    }

    fn spawn_session_watcher(self: &Arc<Self>, provider: Provider) {
        let mut changes = self.session(provider).changes();
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(token) = changes.next().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let authenticated = token.is_some();
                manager.state.send_modify(|state| match provider {
                    Provider::GitHub => state.github_authenticated = authenticated,
                    Provider::GitLab => state.gitlab_authenticated = authenticated,
                });

                // Signing in switches to the authenticated quota budget; the
                // anonymous exhaustion record no longer applies.
                if authenticated {
                    manager.tracker.clear(provider);
                    manager.update_rate_limit(None, provider);
                }
            }
        });
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    pub fn session(&self, provider: Provider) -> &Arc<TokenSession> {
        match provider {
            Provider::GitHub => &self.github_session,
            Provider::GitLab => &self.gitlab_session,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Reactive state stream; replays the current value to new subscribers
    pub fn watch(&self) -> WatchStream<AppState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Publish a provider's rate-limit condition
    pub fn update_rate_limit(&self, snapshot: Option<RateLimitSnapshot>, provider: Provider) {
        if let Some(ref info) = snapshot {
            log::debug!(
                "[state] {} rate limit: {}/{} remaining, resets at {}",
                provider,
                info.remaining,
                info.limit,
                info.reset_at
            );
        }
        self.state.send_modify(|state| match provider {
            Provider::GitHub => state.github_rate_limit = snapshot.clone(),
            Provider::GitLab => state.gitlab_rate_limit = snapshot.clone(),
        });
    }

    /// Ask the user to sign in to the given provider
    pub fn trigger_auth_prompt(&self, provider: Provider) {
        log::debug!("[state] Authentication required for {}", provider);
        self.state
            .send_modify(|state| state.auth_prompt = Some(provider));
    }

    pub fn dismiss_auth_prompt(&self) {
        self.state.send_modify(|state| state.auth_prompt = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, Token, TokenRefresher};
    use crate::error::Result;

    struct NoRefresh;

    #[async_trait::async_trait]
    impl TokenRefresher for NoRefresh {
        async fn refresh(&self, _provider: Provider, _refresh_token: &str) -> Result<Token> {
            unreachable!("no refresh in these tests")
        }
    }

    fn manager() -> Arc<AppStateManager> {
        let tracker = Arc::new(RateLimitTracker::new());
        let github = Arc::new(TokenSession::new(
            Provider::GitHub,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(NoRefresh),
        ));
        let gitlab = Arc::new(TokenSession::new(
            Provider::GitLab,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(NoRefresh),
        ));
        AppStateManager::new(tracker, github, gitlab)
    }

    fn snapshot(provider: Provider, remaining: i64) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: 60,
            remaining,
            reset_at: chrono::Utc::now() + chrono::Duration::seconds(300),
            resource: "core".into(),
            provider,
        }
    }

    #[tokio::test]
    async fn test_rate_limit_updates_per_provider() {
        let manager = manager();
        manager.update_rate_limit(Some(snapshot(Provider::GitHub, 0)), Provider::GitHub);

        let state = manager.state();
        assert!(state.rate_limit(Provider::GitHub).is_some());
        assert!(state.rate_limit(Provider::GitLab).is_none());
    }

    #[tokio::test]
    async fn test_auth_prompt_set_and_dismissed() {
        let manager = manager();
        manager.trigger_auth_prompt(Provider::GitLab);
        assert_eq!(manager.state().auth_prompt, Some(Provider::GitLab));

        manager.dismiss_auth_prompt();
        assert!(manager.state().auth_prompt.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_marks_authenticated_and_clears_rate_limit() {
        let manager = manager();
        manager
            .tracker()
            .record(snapshot(Provider::GitHub, 0));
        manager.update_rate_limit(Some(snapshot(Provider::GitHub, 0)), Provider::GitHub);

        manager
            .session(Provider::GitHub)
            .save(Token::permanent(Provider::GitHub, "gho_z"))
            .await
            .unwrap();

        // The watcher task runs asynchronously; poll the observable state
        let mut watch = manager.watch();
        loop {
            let state = watch.next().await.expect("state stream stays open");
            if state.github_authenticated {
                assert!(state.github_rate_limit.is_none());
                break;
            }
        }
        assert!(!manager.tracker().is_blocked(Provider::GitHub));
        assert!(!manager.state().gitlab_authenticated);
    }
}

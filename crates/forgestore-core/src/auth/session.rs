//! Per-provider token session
//!
//! Owns the in-memory copy of the provider's token, backed by a `TokenStore`.
//! Exposes the current value, a change stream that replays the latest value
//! to new subscribers, and a refresh operation that coalesces concurrent
//! callers onto a single network refresh.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, OnceCell};
use tokio_stream::wrappers::WatchStream;

use crate::auth::refresh::TokenRefresher;
use crate::auth::store::TokenStore;
use crate::auth::token::Token;
use crate::error::Result;
use crate::models::Provider;

pub struct TokenSession {
    provider: Provider,
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    current: watch::Sender<Option<Token>>,
    hydrated: OnceCell<()>,
    refresh_lock: Mutex<()>,
}

impl TokenSession {
    pub fn new(
        provider: Provider,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            store,
            refresher,
            current,
            hydrated: OnceCell::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Last-known token, non-blocking
    pub fn current(&self) -> Option<Token> {
        self.current.borrow().clone()
    }

    /// Stream of token changes
    ///
    /// Emits the current value immediately, then every save/clear.
    pub fn changes(&self) -> WatchStream<Option<Token>> {
        WatchStream::new(self.current.subscribe())
    }

    /// One-time hydration from the backing store
    ///
    /// Concurrent and repeated calls coalesce; all of them complete only
    /// after the single store read has landed in memory.
    pub async fn load(&self) {
        self.hydrated
            .get_or_init(|| async {
                let token = self.store.load(self.provider).await;
                log::debug!(
                    "[auth:session] Hydrated {} token: present={}",
                    self.provider,
                    token.is_some()
                );
                self.current.send_replace(token);
            })
            .await;
    }

    /// Await hydration, then return the in-memory token
    pub async fn reload_from_store(&self) -> Option<Token> {
        self.load().await;
        self.current()
    }

    /// Persist a token, update the in-memory value, notify subscribers
    pub async fn save(&self, token: Token) -> Result<()> {
        self.store.save(self.provider, &token).await?;
        self.current.send_replace(Some(token));
        Ok(())
    }

    /// Delete the persisted token and sign the provider out
    pub async fn clear(&self) -> Result<()> {
        self.store.clear(self.provider).await?;
        self.current.send_replace(None);
        Ok(())
    }

    /// Refresh the token if it is about to expire
    ///
    /// Returns the token to use for the next request, or `None` when the
    /// caller must re-authenticate. At most one network refresh is in flight
    /// per provider; concurrent callers block on the same lock and observe
    /// the single outcome. GitHub tokens never expire, so refresh is a no-op
    /// there.
    pub async fn refresh_if_needed(&self) -> Option<Token> {
        let _guard = self.refresh_lock.lock().await;

        let token = self.current()?;

        if self.provider == Provider::GitHub {
            return Some(token);
        }

        if !token.is_expiring_soon() {
            return Some(token);
        }

        let refresh_token = match token.refresh_token {
            Some(ref value) => value.clone(),
            None => {
                log::error!("[auth:session] Token expired but no refresh token available");
                let _ = self.clear().await;
                return None;
            }
        };

        log::debug!("[auth:session] Refreshing {} token...", self.provider);
        match self.refresher.refresh(self.provider, &refresh_token).await {
            Ok(new_token) => {
                if let Err(e) = self.save(new_token.clone()).await {
                    log::error!("[auth:session] Could not persist refreshed token: {}", e);
                }
                log::debug!("[auth:session] Token refreshed successfully");
                Some(new_token)
            }
            Err(e) => {
                log::error!("[auth:session] Failed to refresh token: {}", e);
                let _ = self.clear().await;
                None
            }
        }
    }
}

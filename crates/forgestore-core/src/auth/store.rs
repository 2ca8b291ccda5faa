//! Durable token persistence
//!
//! The store is an opaque key-value collaborator keyed by provider. A
//! missing or corrupt entry loads as `None` - the session layer treats that
//! as "signed out", never as an error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::token::Token;
use crate::error::{ApiError, Result};
use crate::models::Provider;

/// Secure-ish persistence for OAuth tokens, one slot per provider
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, provider: Provider, token: &Token) -> Result<()>;
    async fn load(&self, provider: Provider) -> Option<Token>;
    async fn clear(&self, provider: Provider) -> Result<()>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Token store writing one JSON file per provider under the user config dir
///
/// Desktop equivalent of a platform keychain; file permissions are the
/// platform's concern.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Store rooted at the default config location (`~/.config/forgestore`)
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| ApiError::config("Could not resolve a user config directory"))?
            .join("forgestore");
        Ok(Self { dir })
    }

    /// Store rooted at an explicit directory (tests, portable installs)
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn token_path(&self, provider: Provider) -> PathBuf {
        self.dir.join(format!("token_{}.json", provider))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, provider: Provider, token: &Token) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ApiError::config(format!("Could not create token dir: {}", e)))?;
        let json = serde_json::to_string_pretty(token)?;
        tokio::fs::write(self.token_path(provider), json)
            .await
            .map_err(|e| ApiError::config(format!("Could not write token file: {}", e)))?;
        Ok(())
    }

    async fn load(&self, provider: Provider) -> Option<Token> {
        let raw = tokio::fs::read_to_string(self.token_path(provider))
            .await
            .ok()?;
        match serde_json::from_str::<Token>(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                log::error!("[auth:store] Corrupt token file for {}: {}", provider, e);
                None
            }
        }
    }

    async fn clear(&self, provider: Provider) -> Result<()> {
        match tokio::fs::remove_file(self.token_path(provider)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::config(format!(
                "Could not remove token file: {}",
                e
            ))),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<Provider, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, provider: Provider, token: &Token) -> Result<()> {
        self.tokens
            .lock()
            .expect("token store lock poisoned")
            .insert(provider, token.clone());
        Ok(())
    }

    async fn load(&self, provider: Provider) -> Option<Token> {
        self.tokens
            .lock()
            .expect("token store lock poisoned")
            .get(&provider)
            .cloned()
    }

    async fn clear(&self, provider: Provider) -> Result<()> {
        self.tokens
            .lock()
            .expect("token store lock poisoned")
            .remove(&provider);
        Ok(())
    }
}

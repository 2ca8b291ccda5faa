//! # forgestore-core
//!
//! Core logic for Forgestore, an "app store" over GitHub and GitLab release
//! artifacts - shared between the CLI and any GUI shell.
//!
//! This crate provides:
//! - OAuth device-flow authentication and token sessions (`auth` module)
//! - Rate-limit-aware HTTP plumbing for both providers (`net` module)
//! - Normalized provider clients behind one trait (`forge` module)
//! - The concurrent installer-discovery pipeline (`discovery` module)
//! - The shared app-state side channel (`state` module)
//! - Unified error handling (`error` module)

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod forge;
pub mod models;
pub mod net;
pub mod state;

// Re-exports for convenience
pub use config::OAuthConfig;
pub use error::{ApiError, Result};

// Re-export commonly used types from models
pub use models::{
    PaginatedBatch, Provider, ReleaseAsset, ReleaseSummary, RepoOwner, RepoStats,
    RepositorySummary, UserProfile,
};

// Re-export the component surface
pub use auth::{
    DeviceAuthClient, DeviceFlowStart, DevicePoll, FileTokenStore, MemoryTokenStore,
    OAuthTokenRefresher, Token, TokenRefresher, TokenSession, TokenStore,
};
pub use discovery::{
    DiscoveryCategory, DiscoveryPipeline, DiscoveryStream, SearchSort, TargetPlatform,
    DEFAULT_DESIRED_COUNT,
};
pub use forge::{ForgeClient, GithubClient, GitlabClient, RepoQuery};
pub use net::{RateLimitSnapshot, RateLimitTracker};
pub use state::{AppState, AppStateManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!version().is_empty());
    }
}

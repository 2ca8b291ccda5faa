//! Provider clients
//!
//! `ForgeClient` is the one contract the rest of the crate programs against;
//! `GithubClient` and `GitlabClient` supply the endpoint knowledge and
//! response normalization for their provider. Tests substitute scripted
//! implementations.

pub mod github;
pub mod gitlab;
pub mod markdown;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Provider, ReleaseSummary, RepoStats, RepositorySummary, UserProfile};

pub use github::GithubClient;
pub use gitlab::GitlabClient;

/// Provider-shaped repository search descriptor
///
/// `text` is a full query expression for GitHub's search syntax and a plain
/// search term for GitLab. `min_stars` is a star floor the pipeline applies
/// to GitLab results after fetching (GitHub encodes the floor in the query
/// itself); clients return pages unfiltered.
#[derive(Debug, Clone, Default)]
pub struct RepoQuery {
    pub text: String,
    pub sort: Option<String>,
    pub order: String,
    pub min_stars: i64,
}

/// The six domain operations plus the raw release listing the installer
/// probe uses, per provider
#[async_trait]
pub trait ForgeClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One page of repository search results, normalized
    async fn search_repositories(
        &self,
        query: &RepoQuery,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepositorySummary>>;

    /// Most recent releases of a repository, newest first, drafts included
    async fn list_recent_releases(&self, full_name: &str) -> Result<Vec<ReleaseSummary>>;

    async fn get_repository_by_id(&self, id: i64) -> Result<RepositorySummary>;

    /// Latest stable (non-draft, non-prerelease) release with its body
    /// cleaned and relative links absolutized; `None` when there is none
    async fn get_latest_release(
        &self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Option<ReleaseSummary>>;

    /// Default-branch README with relative links absolutized; `None` when
    /// the repository has none or it cannot be fetched
    async fn get_readme(
        &self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Option<String>>;

    async fn get_repo_stats(&self, owner: &str, repo: &str) -> Result<RepoStats>;

    async fn get_user_profile(&self, username: &str) -> Result<UserProfile>;
}

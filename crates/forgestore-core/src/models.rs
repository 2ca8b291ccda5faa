//! Domain models shared across providers
//!
//! GitHub repositories and GitLab projects are normalized into one shape so
//! the discovery pipeline, resolvers, and front ends never branch on the
//! provider for plain data access.

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider
// ============================================================================

/// The backing REST API a value came from
///
/// Every identifier in this crate is provider-local; ids must never be
/// compared across providers without this tag alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    /// REST base URL for API calls
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://api.github.com",
            Provider::GitLab => "https://gitlab.com/api/v4",
        }
    }

    /// Host used for OAuth device-flow endpoints
    pub fn oauth_base_url(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com",
            Provider::GitLab => "https://gitlab.com",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::GitHub => write!(f, "github"),
            Provider::GitLab => write!(f, "gitlab"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" | "gh" => Ok(Provider::GitHub),
            "gitlab" | "gl" => Ok(Provider::GitLab),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Owner (GitHub user/org, GitLab namespace) of a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoOwner {
    pub id: i64,
    pub login: String,
    pub avatar_url: String,
    pub profile_url: String,
}

/// Normalized repository summary
///
/// Merges the GitHub "repository" and GitLab "project" representations.
/// `updated_at` is carried as the provider's own timestamp string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: RepoOwner,
    pub description: Option<String>,
    pub html_url: String,
    pub star_count: i64,
    pub fork_count: i64,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub releases_url: String,
    pub updated_at: String,
    pub default_branch: String,
}

/// Star/fork/issue counters for the details view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub stars: i64,
    pub forks: i64,
    pub open_issues: i64,
}

// ============================================================================
// Releases
// ============================================================================

/// One downloadable artifact attached to a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: i64,
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub download_url: String,
    pub uploader: RepoOwner,
}

/// Normalized release
///
/// GitLab has no draft concept and flags pre-releases as `upcoming_release`;
/// both are folded into the `draft`/`prerelease` booleans here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub author: RepoOwner,
    pub published_at: Option<String>,
    pub description: Option<String>,
    pub assets: Vec<ReleaseAsset>,
    pub tarball_url: String,
    pub zipball_url: String,
    pub html_url: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl ReleaseSummary {
    /// A release end users can install from
    pub fn is_stable(&self) -> bool {
        !self.draft && !self.prerelease
    }
}

// ============================================================================
// Users
// ============================================================================

/// Full user profile for the details view
///
/// GitLab's public user endpoint exposes no follower/repo counters; those
/// fields are zero-filled there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: String,
    pub profile_url: String,
    pub followers: i64,
    pub following: i64,
    pub public_repos: i64,
    pub location: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
}

// ============================================================================
// Pagination
// ============================================================================

/// One emission of the discovery pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedBatch {
    pub items: Vec<RepositorySummary>,
    pub has_more: bool,
    pub next_page_index: u32,
    pub total_count: Option<i64>,
}

impl PaginatedBatch {
    /// Terminal empty batch for a search that found nothing
    pub fn empty(next_page_index: u32) -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_page_index,
            total_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::GitHub.to_string(), "github");
        assert_eq!(Provider::GitLab.to_string(), "gitlab");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("github".parse::<Provider>().unwrap(), Provider::GitHub);
        assert_eq!("GitLab".parse::<Provider>().unwrap(), Provider::GitLab);
        assert_eq!("gh".parse::<Provider>().unwrap(), Provider::GitHub);
        assert!("bitbucket".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_base_urls() {
        assert_eq!(Provider::GitHub.api_base_url(), "https://api.github.com");
        assert_eq!(Provider::GitLab.api_base_url(), "https://gitlab.com/api/v4");
        assert_eq!(Provider::GitHub.oauth_base_url(), "https://github.com");
    }

    #[test]
    fn test_release_stability() {
        let owner = RepoOwner {
            id: 1,
            login: "octo".into(),
            avatar_url: String::new(),
            profile_url: String::new(),
        };
        let release = ReleaseSummary {
            id: 10,
            tag_name: "v1.0".into(),
            name: None,
            author: owner,
            published_at: None,
            description: None,
            assets: vec![],
            tarball_url: String::new(),
            zipball_url: String::new(),
            html_url: String::new(),
            draft: false,
            prerelease: true,
        };
        assert!(!release.is_stable());
        let stable = ReleaseSummary {
            prerelease: false,
            ..release
        };
        assert!(stable.is_stable());
    }

    #[test]
    fn test_empty_batch() {
        let batch = PaginatedBatch::empty(3);
        assert!(batch.items.is_empty());
        assert!(!batch.has_more);
        assert_eq!(batch.next_page_index, 3);
    }
}

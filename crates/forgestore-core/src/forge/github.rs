//! GitHub client
//!
//! Endpoint shapes and normalization for api.github.com. READMEs come from
//! the raw-content host rather than the contents API - no base64 detour and
//! the response is already the markdown body.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::forge::markdown::{clean_release_body, preprocess_markdown};
use crate::forge::{ForgeClient, RepoQuery};
use crate::models::{
    Provider, ReleaseAsset, ReleaseSummary, RepoOwner, RepoStats, RepositorySummary, UserProfile,
};
use crate::net::safecall::{safe_api_call, safe_api_call_text};
use crate::net::transport::ApiTransport;
use crate::state::AppStateManager;

const RELEASES_PER_PROBE: u32 = 10;

// ============================================================================
// Network models
// ============================================================================

#[derive(Debug, Deserialize)]
struct OwnerDto {
    id: i64,
    login: String,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoDto {
    id: i64,
    name: String,
    full_name: String,
    owner: OwnerDto,
    description: Option<String>,
    html_url: String,
    stargazers_count: i64,
    forks_count: i64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    updated_at: String,
    #[serde(default = "default_branch_name")]
    default_branch: String,
}

fn default_branch_name() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
struct SearchResponseDto {
    total_count: Option<i64>,
    #[serde(default)]
    items: Vec<RepoDto>,
}

#[derive(Debug, Deserialize)]
struct AssetDto {
    id: i64,
    name: String,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    size: i64,
    browser_download_url: String,
    uploader: Option<OwnerDto>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    id: i64,
    tag_name: String,
    name: Option<String>,
    author: Option<OwnerDto>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<String>,
    created_at: Option<String>,
    body: Option<String>,
    #[serde(default)]
    assets: Vec<AssetDto>,
    #[serde(default)]
    tarball_url: String,
    #[serde(default)]
    zipball_url: String,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfoDto {
    stargazers_count: i64,
    forks_count: i64,
    #[serde(default)]
    open_issues_count: i64,
}

#[derive(Debug, Deserialize)]
struct UserProfileDto {
    id: i64,
    login: String,
    name: Option<String>,
    bio: Option<String>,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    followers: i64,
    #[serde(default)]
    following: i64,
    #[serde(default)]
    public_repos: i64,
    location: Option<String>,
    company: Option<String>,
    blog: Option<String>,
    twitter_username: Option<String>,
}

// ============================================================================
// Mapping
// ============================================================================

fn map_owner(dto: OwnerDto) -> RepoOwner {
    RepoOwner {
        id: dto.id,
        login: dto.login,
        avatar_url: dto.avatar_url,
        profile_url: dto.html_url,
    }
}

fn map_repo(dto: RepoDto) -> RepositorySummary {
    let releases_url = format!("https://api.github.com/repos/{}/releases", dto.full_name);
    RepositorySummary {
        id: dto.id,
        name: dto.name,
        full_name: dto.full_name,
        owner: map_owner(dto.owner),
        description: dto.description,
        html_url: dto.html_url,
        star_count: dto.stargazers_count,
        fork_count: dto.forks_count,
        language: dto.language,
        topics: dto.topics,
        releases_url,
        updated_at: dto.updated_at,
        default_branch: dto.default_branch,
    }
}

fn map_release(dto: ReleaseDto) -> ReleaseSummary {
    let author = dto.author.map(map_owner).unwrap_or(RepoOwner {
        id: 0,
        login: String::new(),
        avatar_url: String::new(),
        profile_url: String::new(),
    });
    ReleaseSummary {
        id: dto.id,
        tag_name: dto.tag_name,
        name: dto.name,
        author,
        published_at: dto.published_at.or(dto.created_at),
        description: dto.body,
        assets: dto
            .assets
            .into_iter()
            .map(|asset| ReleaseAsset {
                id: asset.id,
                name: asset.name,
                content_type: if asset.content_type.is_empty() {
                    "application/octet-stream".to_string()
                } else {
                    asset.content_type
                },
                size_bytes: asset.size,
                download_url: asset.browser_download_url,
                uploader: asset.uploader.map(map_owner).unwrap_or(RepoOwner {
                    id: 0,
                    login: String::new(),
                    avatar_url: String::new(),
                    profile_url: String::new(),
                }),
            })
            .collect(),
        tarball_url: dto.tarball_url,
        zipball_url: dto.zipball_url,
        html_url: dto.html_url,
        draft: dto.draft,
        prerelease: dto.prerelease,
    }
}

fn raw_content_base(owner: &str, repo: &str, branch: &str) -> String {
    format!("https://raw.githubusercontent.com/{owner}/{repo}/{branch}/")
}

// ============================================================================
// Client
// ============================================================================

pub struct GithubClient {
    transport: ApiTransport,
    state: Arc<AppStateManager>,
}

impl GithubClient {
    pub fn new(state: Arc<AppStateManager>) -> Result<Self> {
        let transport = ApiTransport::new(
            Provider::GitHub,
            state.session(Provider::GitHub).clone(),
            state.tracker().clone(),
        )?;
        Ok(Self { transport, state })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let result = safe_api_call(self.state.tracker(), Provider::GitHub, false, || {
            self.transport.get(path, query)
        })
        .await;
        self.report(result)
    }

    /// Mirror a rate-limit failure onto the app-state side channel
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ApiError::RateLimitExceeded { ref snapshot }) = result {
            self.state
                .update_rate_limit(Some(snapshot.clone()), Provider::GitHub);
        }
        result
    }
}

#[async_trait]
impl ForgeClient for GithubClient {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    async fn search_repositories(
        &self,
        query: &RepoQuery,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepositorySummary>> {
        let mut params = vec![
            ("q", query.text.clone()),
            ("order", query.order.clone()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(ref sort) = query.sort {
            params.push(("sort", sort.clone()));
        }

        let response: SearchResponseDto = self.call("search/repositories", &params).await?;
        log::debug!(
            "[forge:github] Page {}: {} repos (total {:?})",
            page,
            response.items.len(),
            response.total_count
        );
        Ok(response.items.into_iter().map(map_repo).collect())
    }

    async fn list_recent_releases(&self, full_name: &str) -> Result<Vec<ReleaseSummary>> {
        let releases: Vec<ReleaseDto> = self
            .call(
                &format!("repos/{}/releases", full_name),
                &[("per_page", RELEASES_PER_PROBE.to_string())],
            )
            .await?;
        Ok(releases.into_iter().map(map_release).collect())
    }

    async fn get_repository_by_id(&self, id: i64) -> Result<RepositorySummary> {
        log::debug!("[forge:github] Fetching repository by id {}", id);
        let dto: RepoDto = self.call(&format!("repositories/{}", id), &[]).await?;
        Ok(map_repo(dto))
    }

    async fn get_latest_release(
        &self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Option<ReleaseSummary>> {
        let releases = self
            .list_recent_releases(&format!("{}/{}", owner, repo))
            .await?;

        let mut stable: Vec<ReleaseSummary> =
            releases.into_iter().filter(|r| r.is_stable()).collect();
        stable.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let Some(mut latest) = stable.into_iter().next() else {
            return Ok(None);
        };

        latest.description = latest.description.map(|body| {
            preprocess_markdown(
                &clean_release_body(&body),
                &raw_content_base(owner, repo, default_branch),
            )
        });
        Ok(Some(latest))
    }

    async fn get_readme(
        &self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Option<String>> {
        let base = raw_content_base(owner, repo, default_branch);
        let url = format!("{}README.md", base);

        let result = safe_api_call_text(self.state.tracker(), Provider::GitHub, false, || {
            self.transport.get(&url, &[])
        })
        .await;

        match self.report(result) {
            Ok(raw) => Ok(Some(preprocess_markdown(&raw, &base))),
            Err(e) => {
                log::error!("[forge:github] Failed to fetch README for {owner}/{repo}: {e}");
                Ok(None)
            }
        }
    }

    async fn get_repo_stats(&self, owner: &str, repo: &str) -> Result<RepoStats> {
        let info: RepoInfoDto = self
            .call(&format!("repos/{}/{}", owner, repo), &[])
            .await?;
        Ok(RepoStats {
            stars: info.stargazers_count,
            forks: info.forks_count,
            open_issues: info.open_issues_count,
        })
    }

    async fn get_user_profile(&self, username: &str) -> Result<UserProfile> {
        let dto: UserProfileDto = self.call(&format!("users/{}", username), &[]).await?;
        Ok(UserProfile {
            id: dto.id,
            login: dto.login,
            name: dto.name,
            bio: dto.bio,
            avatar_url: dto.avatar_url,
            profile_url: dto.html_url,
            followers: dto.followers,
            following: dto.following,
            public_repos: dto.public_repos,
            location: dto.location,
            company: dto.company,
            blog: dto.blog,
            twitter_username: dto.twitter_username,
        })
    }
}

//! GitLab client
//!
//! gitlab.com "projects" normalized into the shared repository shape.
//! GitLab addresses projects by URL-encoded `namespace%2Fname` paths, has no
//! draft releases (only `upcoming_release`), attaches assets as plain links
//! without sizes or uploaders, and exposes no numeric release ids - those
//! are synthesized from the tag name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::forge::markdown::preprocess_markdown;
use crate::forge::{ForgeClient, RepoQuery};
use crate::models::{
    Provider, ReleaseAsset, ReleaseSummary, RepoOwner, RepoStats, RepositorySummary, UserProfile,
};
use crate::net::safecall::{safe_api_call, safe_api_call_text};
use crate::net::transport::ApiTransport;
use crate::state::AppStateManager;

const RELEASES_PER_PROBE: u32 = 10;
const GITLAB_WEB_URL: &str = "https://gitlab.com";

// ============================================================================
// Network models
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamespaceDto {
    id: i64,
    path: String,
    full_path: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectDto {
    id: i64,
    name: String,
    path_with_namespace: String,
    namespace: Option<NamespaceDto>,
    description: Option<String>,
    web_url: String,
    #[serde(default)]
    star_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    topics: Vec<String>,
    avatar_url: Option<String>,
    #[serde(default)]
    last_activity_at: String,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseLinkDto {
    #[serde(default)]
    id: i64,
    name: String,
    url: String,
}

#[derive(Debug, Deserialize, Default)]
struct ReleaseAssetsDto {
    #[serde(default)]
    links: Vec<ReleaseLinkDto>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDto {
    tag_name: String,
    name: Option<String>,
    description: Option<String>,
    released_at: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    upcoming_release: bool,
    assets: Option<ReleaseAssetsDto>,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: i64,
    username: String,
    name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    #[serde(default)]
    web_url: String,
    location: Option<String>,
    organization: Option<String>,
    website_url: Option<String>,
    twitter: Option<String>,
}

// ============================================================================
// Mapping
// ============================================================================

/// URL-encode a project path for use as a path segment
fn encode_path(full_name: &str) -> String {
    full_name.replace('/', "%2F")
}

/// Stable synthetic id for providers without numeric release ids
///
/// Java-style 31-based polynomial over the tag name; deterministic across
/// runs so downstream identity checks hold.
fn tag_id(tag: &str) -> i64 {
    let mut hash: i32 = 0;
    for b in tag.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(b as i32);
    }
    i64::from(hash)
}

fn placeholder_owner(login: &str) -> RepoOwner {
    RepoOwner {
        id: 0,
        login: login.to_string(),
        avatar_url: String::new(),
        profile_url: format!("{}/{}", GITLAB_WEB_URL, login),
    }
}

fn map_project(dto: ProjectDto) -> RepositorySummary {
    let encoded = encode_path(&dto.path_with_namespace);
    let owner = match dto.namespace {
        Some(ns) => RepoOwner {
            id: ns.id,
            login: ns.path,
            avatar_url: dto
                .avatar_url
                .clone()
                .or(ns.avatar_url)
                .unwrap_or_default(),
            profile_url: format!("{}/{}", GITLAB_WEB_URL, ns.full_path),
        },
        None => placeholder_owner(""),
    };

    RepositorySummary {
        id: dto.id,
        name: dto.name,
        full_name: dto.path_with_namespace,
        owner,
        description: dto.description,
        html_url: dto.web_url,
        star_count: dto.star_count,
        fork_count: dto.forks_count,
        language: None,
        topics: dto.topics,
        releases_url: format!("{}/api/v4/projects/{}/releases", GITLAB_WEB_URL, encoded),
        updated_at: dto.last_activity_at,
        default_branch: dto.default_branch.unwrap_or_else(|| "main".to_string()),
    }
}

fn map_release(dto: ReleaseDto, owner: &str, repo: &str) -> ReleaseSummary {
    let tag = dto.tag_name.clone();
    let author = placeholder_owner(owner);
    ReleaseSummary {
        id: tag_id(&tag),
        tag_name: dto.tag_name,
        name: dto.name,
        author: author.clone(),
        published_at: dto.released_at.or(dto.created_at),
        description: dto.description,
        assets: dto
            .assets
            .unwrap_or_default()
            .links
            .into_iter()
            .map(|link| ReleaseAsset {
                id: link.id,
                name: link.name,
                content_type: "application/octet-stream".to_string(),
                size_bytes: 0,
                download_url: link.url,
                uploader: author.clone(),
            })
            .collect(),
        tarball_url: format!(
            "{GITLAB_WEB_URL}/{owner}/{repo}/-/archive/{tag}/{repo}-{tag}.tar.gz"
        ),
        zipball_url: format!("{GITLAB_WEB_URL}/{owner}/{repo}/-/archive/{tag}/{repo}-{tag}.zip"),
        html_url: format!("{GITLAB_WEB_URL}/{owner}/{repo}/-/releases/{tag}"),
        draft: false,
        prerelease: dto.upcoming_release,
    }
}

fn raw_content_base(owner: &str, repo: &str, branch: &str) -> String {
    format!("{GITLAB_WEB_URL}/{owner}/{repo}/-/raw/{branch}/")
}

// ============================================================================
// Client
// ============================================================================

pub struct GitlabClient {
    transport: ApiTransport,
    state: Arc<AppStateManager>,
}

impl GitlabClient {
    pub fn new(state: Arc<AppStateManager>) -> Result<Self> {
        let transport = ApiTransport::new(
            Provider::GitLab,
            state.session(Provider::GitLab).clone(),
            state.tracker().clone(),
        )?;
        Ok(Self { transport, state })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let result = safe_api_call(self.state.tracker(), Provider::GitLab, false, || {
            self.transport.get(path, query)
        })
        .await;
        self.report(result)
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ApiError::RateLimitExceeded { ref snapshot }) = result {
            self.state
                .update_rate_limit(Some(snapshot.clone()), Provider::GitLab);
        }
        result
    }
}

#[async_trait]
impl ForgeClient for GitlabClient {
    fn provider(&self) -> Provider {
        Provider::GitLab
    }

    async fn search_repositories(
        &self,
        query: &RepoQuery,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepositorySummary>> {
        let mut params = vec![
            ("search", query.text.clone()),
            ("sort", query.order.clone()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
            ("visibility", "public".to_string()),
            ("archived", "false".to_string()),
        ];
        if let Some(ref sort) = query.sort {
            params.push(("order_by", sort.clone()));
        }

        let projects: Vec<ProjectDto> = self.call("projects", &params).await?;
        log::debug!(
            "[forge:gitlab] Page {}: {} projects",
            page,
            projects.len()
        );

        // The min_stars floor is applied by the caller: a full unfiltered
        // page is what distinguishes "more pages exist" from a short page.
        Ok(projects.into_iter().map(map_project).collect())
    }

    async fn list_recent_releases(&self, full_name: &str) -> Result<Vec<ReleaseSummary>> {
        let (owner, repo) = full_name.split_once('/').unwrap_or((full_name, ""));
        let releases: Vec<ReleaseDto> = self
            .call(
                &format!("projects/{}/releases", encode_path(full_name)),
                &[("per_page", RELEASES_PER_PROBE.to_string())],
            )
            .await?;
        Ok(releases
            .into_iter()
            .map(|dto| map_release(dto, owner, repo))
            .collect())
    }

    async fn get_repository_by_id(&self, id: i64) -> Result<RepositorySummary> {
        log::debug!("[forge:gitlab] Fetching project by id {}", id);
        let dto: ProjectDto = self.call(&format!("projects/{}", id), &[]).await?;
        Ok(map_project(dto))
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

        let Some(mut latest) = releases.into_iter().find(|r| r.is_stable()) else {
            return Ok(None);
        };

        latest.description = latest.description.map(|body| {
            preprocess_markdown(
                &body.replace("\r\n", "\n"),
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
        let path = format!(
            "projects/{}/repository/files/README.md/raw",
            encode_path(&format!("{}/{}", owner, repo))
        );

        let query = [("ref", default_branch.to_string())];
        let result = safe_api_call_text(self.state.tracker(), Provider::GitLab, false, || {
            self.transport.get(&path, &query)
        })
        .await;

        match self.report(result) {
            Ok(raw) => Ok(Some(preprocess_markdown(
                &raw,
                &raw_content_base(owner, repo, default_branch),
            ))),
            Err(e) => {
                log::error!("[forge:gitlab] Failed to fetch README for {owner}/{repo}: {e}");
                Ok(None)
            }
        }
    }

    async fn get_repo_stats(&self, owner: &str, repo: &str) -> Result<RepoStats> {
        let dto: ProjectDto = self
            .call(
                &format!("projects/{}", encode_path(&format!("{}/{}", owner, repo))),
                &[],
            )
            .await?;
        Ok(RepoStats {
            stars: dto.star_count,
            forks: dto.forks_count,
            open_issues: 0,
        })
    }

    async fn get_user_profile(&self, username: &str) -> Result<UserProfile> {
        let users: Vec<UserDto> = self
            .call("users", &[("username", username.to_string())])
            .await?;

        let user = users.into_iter().next().ok_or_else(|| ApiError::Http {
            status: 404,
            description: format!("User not found: {}", username),
        })?;

        Ok(UserProfile {
            id: user.id,
            login: user.username,
            name: user.name,
            bio: user.bio,
            avatar_url: user.avatar_url.unwrap_or_default(),
            profile_url: user.web_url,
            followers: 0,
            following: 0,
            public_repos: 0,
            location: user.location,
            company: user.organization,
            blog: user.website_url,
            twitter_username: user.twitter,
        })
    }
}

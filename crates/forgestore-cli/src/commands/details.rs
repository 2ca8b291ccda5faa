//! repo / readme / user commands

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tabled::Tabled;

use forgestore_core::{ReleaseSummary, UserProfile};

use crate::commands::{auth, Context};
use crate::output::{print_info, print_output, print_single, truncate};

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    full_name
        .split_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Expected owner/repo, got '{}'", full_name))
}

#[derive(Debug, Serialize, Tabled)]
struct RepoDetailRow {
    field: String,
    value: String,
}

#[derive(Debug, Serialize, Tabled)]
struct AssetRow {
    name: String,
    #[tabled(rename = "size (bytes)")]
    size_bytes: i64,
    #[tabled(rename = "download url")]
    download_url: String,
}

/// Repository details: summary, stats, and the latest stable release
pub async fn repo(ctx: &Context, full_name: Option<&str>, id: Option<i64>) -> Result<()> {
    ctx.hydrate().await?;
    let client = ctx.client()?;

    let summary = match (full_name, id) {
        (_, Some(id)) => client.get_repository_by_id(id).await?,
        (Some(name), None) => return repo_by_name(ctx, name).await,
        (None, None) => bail!("Pass a repository as owner/repo or --id <numeric id>"),
    };

    let rows = vec![
        RepoDetailRow {
            field: "repository".into(),
            value: summary.full_name.clone(),
        },
        RepoDetailRow {
            field: "description".into(),
            value: summary.description.clone().unwrap_or_default(),
        },
        RepoDetailRow {
            field: "stars".into(),
            value: summary.star_count.to_string(),
        },
        RepoDetailRow {
            field: "forks".into(),
            value: summary.fork_count.to_string(),
        },
        RepoDetailRow {
            field: "language".into(),
            value: summary.language.clone().unwrap_or_else(|| "-".into()),
        },
        RepoDetailRow {
            field: "topics".into(),
            value: summary.topics.join(", "),
        },
        RepoDetailRow {
            field: "url".into(),
            value: summary.html_url.clone(),
        },
    ];
    print_output(&rows, ctx.format)?;

    let (owner, repo_name) = split_full_name(&summary.full_name)?;
    print_latest_release(
        ctx,
        client
            .get_latest_release(owner, repo_name, &summary.default_branch)
            .await?,
    )?;

    auth::report_rate_limit(ctx)?;
    Ok(())
}

/// Name-based details go through stats + release endpoints directly
async fn repo_by_name(ctx: &Context, full_name: &str) -> Result<()> {
    let client = ctx.client()?;
    let (owner, repo_name) = split_full_name(full_name)?;

    let stats = client
        .get_repo_stats(owner, repo_name)
        .await
        .with_context(|| format!("Could not fetch {}", full_name))?;

    let rows = vec![
        RepoDetailRow {
            field: "repository".into(),
            value: full_name.to_string(),
        },
        RepoDetailRow {
            field: "stars".into(),
            value: stats.stars.to_string(),
        },
        RepoDetailRow {
            field: "forks".into(),
            value: stats.forks.to_string(),
        },
        RepoDetailRow {
            field: "open issues".into(),
            value: stats.open_issues.to_string(),
        },
    ];
    print_output(&rows, ctx.format)?;

    print_latest_release(ctx, client.get_latest_release(owner, repo_name, "main").await?)?;

    auth::report_rate_limit(ctx)?;
    Ok(())
}

fn print_latest_release(ctx: &Context, release: Option<ReleaseSummary>) -> Result<()> {
    let Some(release) = release else {
        print_info("No stable release found.", ctx.quiet);
        return Ok(());
    };

    print_info(
        &format!(
            "Latest release: {} ({})",
            release.tag_name,
            release.published_at.as_deref().unwrap_or("unpublished")
        ),
        ctx.quiet,
    );

    let assets: Vec<AssetRow> = release
        .assets
        .iter()
        .map(|asset| AssetRow {
            name: asset.name.clone(),
            size_bytes: asset.size_bytes,
            download_url: asset.download_url.clone(),
        })
        .collect();
    if assets.is_empty() {
        print_info("No downloadable assets attached.", ctx.quiet);
    } else {
        print_output(&assets, ctx.format)?;
    }
    Ok(())
}

/// Print the repository README as processed markdown
pub async fn readme(ctx: &Context, full_name: &str, branch: Option<&str>) -> Result<()> {
    ctx.hydrate().await?;
    let client = ctx.client()?;
    let (owner, repo_name) = split_full_name(full_name)?;

    match client
        .get_readme(owner, repo_name, branch.unwrap_or("main"))
        .await?
    {
        Some(markdown) => println!("{}", markdown),
        None => print_info("No README found.", ctx.quiet),
    }

    auth::report_rate_limit(ctx)?;
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    login: String,
    name: String,
    followers: i64,
    #[tabled(rename = "public repos")]
    public_repos: i64,
    location: String,
    bio: String,
    url: String,
}

impl From<&UserProfile> for UserRow {
    fn from(user: &UserProfile) -> Self {
        Self {
            login: user.login.clone(),
            name: user.name.clone().unwrap_or_default(),
            followers: user.followers,
            public_repos: user.public_repos,
            location: user.location.clone().unwrap_or_default(),
            bio: truncate(user.bio.as_deref().unwrap_or(""), 50),
            url: user.profile_url.clone(),
        }
    }
}

/// Look up a user/namespace profile
pub async fn user(ctx: &Context, username: &str) -> Result<()> {
    ctx.hydrate().await?;
    let profile = ctx.client()?.get_user_profile(username).await?;
    print_single(&UserRow::from(&profile), ctx.format)?;
    auth::report_rate_limit(ctx)?;
    Ok(())
}

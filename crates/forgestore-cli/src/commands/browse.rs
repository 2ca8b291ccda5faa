//! trending / new / updated / search commands

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use tokio_stream::StreamExt;

use forgestore_core::{
    DiscoveryCategory, DiscoveryPipeline, DiscoveryStream, RepositorySummary, SearchSort,
};

use crate::commands::{auth, Context};
use crate::output::{print_info, print_output, truncate};

#[derive(Debug, Serialize, Tabled)]
struct RepoRow {
    #[tabled(rename = "repository")]
    full_name: String,
    stars: i64,
    language: String,
    description: String,
    url: String,
}

impl From<&RepositorySummary> for RepoRow {
    fn from(repo: &RepositorySummary) -> Self {
        Self {
            full_name: repo.full_name.clone(),
            stars: repo.star_count,
            language: repo.language.clone().unwrap_or_else(|| "-".to_string()),
            description: truncate(repo.description.as_deref().unwrap_or(""), 60),
            url: repo.html_url.clone(),
        }
    }
}

/// Stream one discovery category to the terminal
pub async fn category(ctx: &Context, category: DiscoveryCategory, page: u32) -> Result<()> {
    ctx.hydrate().await?;
    let pipeline = DiscoveryPipeline::new(ctx.client()?, ctx.state.clone(), ctx.platform);
    drain(ctx, pipeline.category(category, page)).await
}

/// Stream keyword-search results to the terminal
pub async fn search(ctx: &Context, query: &str, sort: SearchSort, page: u32) -> Result<()> {
    ctx.hydrate().await?;
    let pipeline = DiscoveryPipeline::new(ctx.client()?, ctx.state.clone(), ctx.platform);
    drain(ctx, pipeline.keyword_search(query, sort, page)).await
}

/// Print batches as the pipeline emits them, then any side-channel conditions
async fn drain(ctx: &Context, mut stream: DiscoveryStream) -> Result<()> {
    let mut total = 0usize;
    let mut next_page = None;

    while let Some(batch) = stream.next().await {
        total += batch.items.len();
        if !batch.items.is_empty() {
            let rows: Vec<RepoRow> = batch.items.iter().map(RepoRow::from).collect();
            print_output(&rows, ctx.format)?;
        }
        next_page = batch.has_more.then_some(batch.next_page_index);
    }

    if total == 0 {
        print_info("No installable repositories found.", ctx.quiet);
    } else if let Some(page) = next_page {
        print_info(&format!("More results: pass --page {}", page), ctx.quiet);
    }

    auth::report_auth_prompt(ctx);
    auth::report_rate_limit(ctx)?;
    Ok(())
}

//! Forgestore CLI - an app store over GitHub and GitLab releases
//!
//! Browse trending/new/updated repositories that ship installable artifacts
//! for your platform, search by keyword, inspect releases, and sign in via
//! the OAuth device flow.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use forgestore_core::{DiscoveryCategory, Provider, SearchSort, TargetPlatform};

#[derive(Parser)]
#[command(name = "forgestore")]
#[command(author, version, about = "App store over GitHub and GitLab releases", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Provider to talk to: github or gitlab
    #[arg(long, global = true, default_value = "github")]
    provider: Provider,

    /// Target platform for installer filtering (defaults to this host)
    #[arg(long, global = true)]
    platform: Option<TargetPlatform>,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in via the OAuth device flow
    Login,

    /// Remove the stored token for the provider
    Logout,

    /// Show sign-in state and rate limits
    Status,

    /// Established repositories with recent activity and installers
    Trending {
        /// API page to start from
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Repositories created in the last month
    New {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Repositories updated in the last few days
    Updated {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Keyword search for repositories with installers
    Search {
        /// Search terms
        query: String,

        /// Sort order: stars, forks, or best-match
        #[arg(long, default_value = "best-match")]
        sort: SearchSort,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Repository details, stats, and latest release assets
    Repo {
        /// Repository as owner/repo
        full_name: Option<String>,

        /// Provider-local numeric repository id
        #[arg(long)]
        id: Option<i64>,
    },

    /// Print a repository README
    Readme {
        /// Repository as owner/repo
        full_name: String,

        /// Branch to read from (default: main)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Look up a user profile
    User {
        /// Username / namespace
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let platform = cli.platform.unwrap_or_else(TargetPlatform::host);
    let ctx = commands::Context::new(cli.format, cli.quiet, cli.provider, platform)?;

    match cli.command {
        Commands::Login => commands::auth::login(&ctx).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Status => commands::auth::status(&ctx).await,
        Commands::Trending { page } => {
            commands::browse::category(&ctx, DiscoveryCategory::Trending, page).await
        }
        Commands::New { page } => {
            commands::browse::category(&ctx, DiscoveryCategory::New, page).await
        }
        Commands::Updated { page } => {
            commands::browse::category(&ctx, DiscoveryCategory::RecentlyUpdated, page).await
        }
        Commands::Search { query, sort, page } => {
            commands::browse::search(&ctx, &query, sort, page).await
        }
        Commands::Repo { full_name, id } => {
            commands::details::repo(&ctx, full_name.as_deref(), id).await
        }
        Commands::Readme { full_name, branch } => {
            commands::details::readme(&ctx, &full_name, branch.as_deref()).await
        }
        Commands::User { username } => commands::details::user(&ctx, &username).await,
    }
}

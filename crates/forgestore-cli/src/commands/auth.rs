//! login / logout / status commands

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tabled::Tabled;

use forgestore_core::{DeviceAuthClient, DevicePoll, Provider};

use crate::commands::Context;
use crate::output::{print_info, print_single, print_success};

/// Seconds added to the poll interval after a `slow_down` response
const SLOW_DOWN_STEP: u64 = 5;

/// Run the OAuth device flow for the selected provider and persist the token
pub async fn login(ctx: &Context) -> Result<()> {
    let provider = ctx.provider;
    let client_id = ctx.config.client_id(provider).to_string();
    if client_id.is_empty() {
        bail!(
            "No OAuth client id configured for {}. Set {} (and the GitLab secret for gitlab).",
            provider,
            match provider {
                Provider::GitHub => forgestore_core::config::GITHUB_CLIENT_ID_VAR,
                Provider::GitLab => forgestore_core::config::GITLAB_CLIENT_ID_VAR,
            }
        );
    }

    let device = DeviceAuthClient::new(provider);
    let start = device
        .start_device_flow(&client_id, device.default_scopes())
        .await
        .with_context(|| format!("Could not start the {} device flow", provider))?;

    print_info(
        &format!(
            "Open {} and enter the code: {}",
            start.verification_uri, start.user_code
        ),
        false,
    );
    print_info("Waiting for authorization...", ctx.quiet);

    let mut interval = start.poll_interval.max(1);
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(start.expires_in);

    let token = loop {
        if tokio::time::Instant::now() >= deadline {
            bail!("Device code expired before authorization; run login again");
        }
        tokio::time::sleep(std::time::Duration::from_secs(interval)).await;

        match device.poll_device_token(&client_id, &start.device_code).await {
            Ok(DevicePoll::Authorized(token)) => break token,
            Ok(DevicePoll::Pending) => continue,
            Ok(DevicePoll::SlowDown) => {
                interval += SLOW_DOWN_STEP;
                log::debug!("Provider asked to slow down; interval now {}s", interval);
            }
            Err(e) => return Err(e).with_context(|| format!("{} authorization failed", provider)),
        }
    };

    ctx.state
        .session(provider)
        .save(token)
        .await
        .context("Could not persist the token")?;

    print_success(&format!("Signed in to {}", provider), ctx.quiet);
    Ok(())
}

/// Drop the persisted token for the selected provider
pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.state.session(ctx.provider).clear().await?;
    print_success(&format!("Signed out of {}", ctx.provider), ctx.quiet);
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct StatusRow {
    provider: String,
    authenticated: bool,
    #[tabled(rename = "rate limit")]
    rate_limit: String,
    #[tabled(rename = "resets in")]
    resets_in: String,
}

/// Show sign-in state and last-known rate limits for both providers
pub async fn status(ctx: &Context) -> Result<()> {
    ctx.hydrate().await?;

    let mut rows = Vec::new();
    for provider in [Provider::GitHub, Provider::GitLab] {
        let authenticated = ctx.state.session(provider).current().is_some();
        let (rate_limit, resets_in) = match ctx.state.tracker().current(provider) {
            Some(snapshot) => (
                format!("{}/{} remaining", snapshot.remaining, snapshot.limit),
                format!("{}s", snapshot.time_until_reset().as_secs()),
            ),
            None => ("unknown".to_string(), "-".to_string()),
        };
        rows.push(StatusRow {
            provider: provider.to_string(),
            authenticated,
            rate_limit,
            resets_in,
        });
    }

    crate::output::print_output(&rows, ctx.format)
}

/// Show the sign-in prompt if some earlier operation raised it
pub fn report_auth_prompt(ctx: &Context) {
    if let Some(provider) = ctx.state.state().auth_prompt {
        print_info(
            &format!(
                "{} requires sign-in for this operation. Run: forgestore login --provider {}",
                provider, provider
            ),
            false,
        );
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct RateLimitRow {
    pub provider: String,
    pub remaining: i64,
    pub limit: i64,
    #[tabled(rename = "resets in (s)")]
    pub resets_in_secs: u64,
}

/// Print the rate-limit condition if one is being reported
pub fn report_rate_limit(ctx: &Context) -> Result<()> {
    let state = ctx.state.state();
    for provider in [Provider::GitHub, Provider::GitLab] {
        if let Some(snapshot) = state.rate_limit(provider) {
            if snapshot.is_exhausted() {
                let row = RateLimitRow {
                    provider: provider.to_string(),
                    remaining: snapshot.remaining,
                    limit: snapshot.limit,
                    resets_in_secs: snapshot.time_until_reset().as_secs(),
                };
                print_info(
                    &format!("{} API rate limit exhausted - sign in for higher limits", provider),
                    false,
                );
                print_single(&row, ctx.format)?;
            }
        }
    }
    Ok(())
}

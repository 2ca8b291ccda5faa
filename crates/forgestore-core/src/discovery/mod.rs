//! Installer discovery pipeline
//!
//! Turns one provider search into a lazy stream of result batches: fetch a
//! page, score and prune candidates for the target platform, probe each
//! survivor's releases for an installable asset with bounded concurrency,
//! and emit confirmed hits in their original candidate order, a few at a
//! time, until the desired count or the page cap is reached.
//!
//! Probes are joined in launch order, not completion order - a slow probe
//! holds back later, faster ones. That keeps the emitted order deterministic
//! across runs and is deliberate.

pub mod platform;
pub mod query;

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ApiError;
use crate::forge::{ForgeClient, RepoQuery};
use crate::models::{PaginatedBatch, Provider, RepositorySummary};
use crate::state::AppStateManager;

pub use platform::TargetPlatform;
pub use query::{DiscoveryCategory, SearchSort};

/// Items requested per API page
const PER_PAGE: u32 = 100;
/// Hard cap on pages fetched per invocation
const MAX_PAGES_TO_FETCH: u32 = 5;
/// Fan-out bound: scored candidates kept per page
const MAX_CANDIDATES_PER_PAGE: usize = 50;
/// Simultaneous in-flight installer probes
const PROBE_CONCURRENCY: usize = 25;
/// Per-candidate probe time box
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Confirmed hits accumulated between incremental emissions
const EMIT_EVERY: usize = 3;
/// Default result target per invocation
pub const DEFAULT_DESIRED_COUNT: usize = 10;

/// Why the page loop ended; decides the final batch's `has_more`
enum StopCause {
    /// Desired count reached - more qualifying repos may exist
    DesiredReached,
    /// Page cap hit - more pages may exist
    PageCap,
    /// Provider ran out of data (empty or short page, star floor passed)
    Exhausted,
    /// Rate limit / auth / transport failure; reported via the side channel
    Aborted,
}

/// The discovery engine for one provider + platform pair
pub struct DiscoveryPipeline {
    client: Arc<dyn ForgeClient>,
    state: Arc<AppStateManager>,
    platform: TargetPlatform,
}

impl DiscoveryPipeline {
    pub fn new(
        client: Arc<dyn ForgeClient>,
        state: Arc<AppStateManager>,
        platform: TargetPlatform,
    ) -> Self {
        Self {
            client,
            state,
            platform,
        }
    }

    /// Stream one of the browsing categories
    pub fn category(&self, category: DiscoveryCategory, start_page: u32) -> DiscoveryStream {
        let query = category.query(self.client.provider(), self.platform);
        self.run(query, start_page, DEFAULT_DESIRED_COUNT)
    }

    /// Stream keyword-search results
    pub fn keyword_search(&self, text: &str, sort: SearchSort, start_page: u32) -> DiscoveryStream {
        let query = sort.query(self.client.provider(), text);
        self.run(query, start_page, DEFAULT_DESIRED_COUNT)
    }

    /// Run the pipeline for an arbitrary query
    ///
    /// The returned stream is lazy per batch but the engine runs ahead in a
    /// background task; dropping the stream cancels the task and every
    /// in-flight probe with it.
    pub fn run(&self, query: RepoQuery, start_page: u32, desired_count: usize) -> DiscoveryStream {
        let (tx, rx) = mpsc::channel(8);
        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        let platform = self.platform;

        let handle = tokio::spawn(async move {
            run_discovery(client, state, platform, query, start_page, desired_count, tx).await;
        });

        DiscoveryStream {
            rx: ReceiverStream::new(rx),
            handle,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_discovery(
    client: Arc<dyn ForgeClient>,
    state: Arc<AppStateManager>,
    platform: TargetPlatform,
    query: RepoQuery,
    start_page: u32,
    desired_count: usize,
    tx: mpsc::Sender<PaginatedBatch>,
) {
    let provider = client.provider();

    // GitLab refuses anonymous project search; raise the prompt up front
    // instead of burning a request on a guaranteed 401.
    if provider == Provider::GitLab && !state.state().is_authenticated(provider) {
        log::error!("[discovery] Not authenticated for GitLab search - raising login prompt");
        state.trigger_auth_prompt(provider);
        let _ = tx.send(PaginatedBatch::empty(start_page)).await;
        return;
    }

    let mut results: Vec<RepositorySummary> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut current_page = start_page;
    let mut pages_fetched = 0u32;
    let mut last_emitted = 0usize;

    log::debug!(
        "[discovery] {} query: {:?} | sort: {:?} | page {}",
        provider,
        query.text,
        query.sort,
        start_page
    );

    let cause = 'pages: loop {
        if results.len() >= desired_count {
            break StopCause::DesiredReached;
        }
        if pages_fetched >= MAX_PAGES_TO_FETCH {
            break StopCause::PageCap;
        }

        let page = match client
            .search_repositories(&query, current_page, PER_PAGE)
            .await
        {
            Ok(page) => page,
            Err(ApiError::RateLimitExceeded { snapshot }) => {
                log::error!("[discovery] Rate limited on {}", provider);
                state.update_rate_limit(Some(snapshot), provider);
                break StopCause::Aborted;
            }
            Err(ApiError::AuthRequired(p)) => {
                log::error!("[discovery] Authentication required on {}", p);
                state.trigger_auth_prompt(p);
                break StopCause::Aborted;
            }
            Err(e) => {
                log::error!("[discovery] {} search failed: {}", provider, e);
                break StopCause::Aborted;
            }
        };
        pages_fetched += 1;

        if page.is_empty() {
            break StopCause::Exhausted;
        }
        let page_len = page.len();
        let page_tail_stars = page.last().map(|r| r.star_count).unwrap_or(0);

        // Star floor (GitLab encodes it client-side), then score, prune,
        // and cap the fan-out.
        let candidates: Vec<RepositorySummary> = page
            .into_iter()
            .filter(|repo| repo.star_count >= query.min_stars)
            .map(|repo| {
                let score = platform.score(&repo);
                (repo, score)
            })
            .filter(|(_, score)| *score > 0)
            .take(MAX_CANDIDATES_PER_PAGE)
            .map(|(repo, _)| repo)
            .collect();

        log::debug!(
            "[discovery] Page {}: {} candidates to probe",
            current_page,
            candidates.len()
        );

        // Fan out probes with bounded concurrency; `buffered` joins them
        // back in candidate order.
        let mut probes = stream::iter(candidates.into_iter().map(|repo| {
            let client = Arc::clone(&client);
            async move { probe_for_installer(client, platform, repo).await }
        }))
        .buffered(PROBE_CONCURRENCY);

        while let Some(outcome) = probes.next().await {
            let Some(repo) = outcome else { continue };
            if !seen.insert(repo.id) {
                continue;
            }
            log::debug!(
                "[discovery] Found installer repo: {} ({}/{})",
                repo.full_name,
                results.len() + 1,
                desired_count
            );
            results.push(repo);

            if results.len() % EMIT_EVERY == 0 || results.len() >= desired_count {
                let new_items = results[last_emitted..].to_vec();
                if !new_items.is_empty()
                    && tx
                        .send(PaginatedBatch {
                            items: new_items,
                            has_more: true,
                            next_page_index: current_page + 1,
                            total_count: None,
                        })
                        .await
                        .is_err()
                {
                    // Receiver gone; the run is cancelled
                    return;
                }
                last_emitted = results.len();
            }

            if results.len() >= desired_count {
                break;
            }
        }
        drop(probes);

        if results.len() >= desired_count {
            break StopCause::DesiredReached;
        }
        // A short page is the provider's last page
        if page_len < PER_PAGE as usize {
            break StopCause::Exhausted;
        }
        // Descending star order below the floor means no later page can pass
        if provider == Provider::GitLab
            && query.sort.as_deref() == Some("star_count")
            && query.order == "desc"
            && page_tail_stars < query.min_stars
        {
            break 'pages StopCause::Exhausted;
        }

        current_page += 1;
    };

    emit_final(&tx, &results, last_emitted, current_page, cause).await;
}

async fn emit_final(
    tx: &mpsc::Sender<PaginatedBatch>,
    results: &[RepositorySummary],
    last_emitted: usize,
    current_page: u32,
    cause: StopCause,
) {
    let has_more = matches!(cause, StopCause::DesiredReached | StopCause::PageCap);

    if results.len() > last_emitted {
        let final_batch = results[last_emitted..].to_vec();
        log::debug!(
            "[discovery] Final emit: {} repos (total {})",
            final_batch.len(),
            results.len()
        );
        let _ = tx
            .send(PaginatedBatch {
                items: final_batch,
                has_more,
                next_page_index: if has_more {
                    current_page + 1
                } else {
                    current_page
                },
                total_count: None,
            })
            .await;
    } else if results.is_empty() {
        log::debug!("[discovery] No results found");
        let _ = tx.send(PaginatedBatch::empty(current_page)).await;
    }
}

/// Check one candidate's latest stable release for a matching asset
///
/// Every failure mode - API error, no stable release, no assets, no match,
/// timeout - drops the candidate; probes never abort the pipeline.
async fn probe_for_installer(
    client: Arc<dyn ForgeClient>,
    platform: TargetPlatform,
    repo: RepositorySummary,
) -> Option<RepositorySummary> {
    let check = async {
        match client.list_recent_releases(&repo.full_name).await {
            Ok(releases) => releases
                .into_iter()
                .find(|release| release.is_stable())
                .map(|release| {
                    !release.assets.is_empty()
                        && release
                            .assets
                            .iter()
                            .any(|asset| platform.is_installer_asset(&asset.name))
                })
                .unwrap_or(false),
            Err(e) => {
                log::error!(
                    "[discovery] Failed to check installers for {}: {}",
                    repo.full_name,
                    e
                );
                false
            }
        }
    };

    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(true) => Some(repo),
        Ok(false) => None,
        Err(_) => {
            log::debug!("[discovery] Probe timed out for {}", repo.full_name);
            None
        }
    }
}

/// Stream of discovery batches; dropping it cancels the run
///
/// Cancellation aborts the engine task, which carries every in-flight probe
/// future with it - nothing mutates the accumulator afterwards.
pub struct DiscoveryStream {
    rx: ReceiverStream<PaginatedBatch>,
    handle: JoinHandle<()>,
}

impl Stream for DiscoveryStream {
    type Item = PaginatedBatch;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Drop for DiscoveryStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

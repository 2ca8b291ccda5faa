//! Discovery pipeline behavior over a scripted provider client
//!
//! These tests replace the network with a deterministic `ForgeClient` so the
//! pipeline's ordering, batching, stop, and abort rules can be pinned down
//! exactly.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use forgestore_core::auth::{MemoryTokenStore, Token, TokenRefresher, TokenSession};
use forgestore_core::discovery::{DiscoveryPipeline, TargetPlatform};
use forgestore_core::error::{ApiError, Result};
use forgestore_core::forge::{ForgeClient, RepoQuery};
use forgestore_core::models::{
    PaginatedBatch, Provider, ReleaseAsset, ReleaseSummary, RepoOwner, RepoStats,
    RepositorySummary, UserProfile,
};
use forgestore_core::net::{RateLimitSnapshot, RateLimitTracker};
use forgestore_core::state::AppStateManager;

// ============================================================================
// Fixtures
// ============================================================================

struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn refresh(&self, _provider: Provider, _refresh_token: &str) -> Result<Token> {
        unreachable!("no refresh in pipeline tests")
    }
}

fn make_state() -> Arc<AppStateManager> {
    let github = Arc::new(TokenSession::new(
        Provider::GitHub,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(NoRefresh),
    ));
    let gitlab = Arc::new(TokenSession::new(
        Provider::GitLab,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(NoRefresh),
    ));
    AppStateManager::new(Arc::new(RateLimitTracker::new()), github, gitlab)
}

async fn sign_in_gitlab(state: &Arc<AppStateManager>) {
    state
        .session(Provider::GitLab)
        .save(Token::expiring(Provider::GitLab, "glpat", None, 7200))
        .await
        .unwrap();
    // The session watcher marks the state asynchronously
    let mut watch = state.watch();
    while let Some(snapshot) = watch.next().await {
        if snapshot.gitlab_authenticated {
            break;
        }
    }
}

fn make_repo(id: i64, stars: i64) -> RepositorySummary {
    RepositorySummary {
        id,
        name: format!("repo{}", id),
        full_name: format!("owner/repo{}", id),
        owner: RepoOwner {
            id: 1,
            login: "owner".into(),
            avatar_url: String::new(),
            profile_url: String::new(),
        },
        description: Some("An android app".into()),
        html_url: String::new(),
        star_count: stars,
        fork_count: 0,
        language: Some("Kotlin".into()),
        topics: vec!["android".into()],
        releases_url: String::new(),
        updated_at: String::new(),
        default_branch: "main".into(),
    }
}

fn apk_release() -> ReleaseSummary {
    let owner = RepoOwner {
        id: 1,
        login: "owner".into(),
        avatar_url: String::new(),
        profile_url: String::new(),
    };
    ReleaseSummary {
        id: 1,
        tag_name: "v1".into(),
        name: None,
        author: owner.clone(),
        published_at: None,
        description: None,
        assets: vec![ReleaseAsset {
            id: 1,
            name: "app-release.apk".into(),
            content_type: "application/octet-stream".into(),
            size_bytes: 1,
            download_url: String::new(),
            uploader: owner,
        }],
        tarball_url: String::new(),
        zipball_url: String::new(),
        html_url: String::new(),
        draft: false,
        prerelease: false,
    }
}

fn docs_release() -> ReleaseSummary {
    let mut release = apk_release();
    release.assets[0].name = "manual.pdf".into();
    release
}

fn exhausted_snapshot(provider: Provider) -> RateLimitSnapshot {
    RateLimitSnapshot {
        limit: 60,
        remaining: 0,
        reset_at: chrono::Utc::now() + chrono::Duration::seconds(600),
        resource: "search".into(),
        provider,
    }
}

/// Deterministic stand-in for a provider client
struct ScriptedForge {
    provider: Provider,
    /// Successive search pages; one entry consumed per call
    pages: Mutex<Vec<Result<Vec<RepositorySummary>>>>,
    /// full_names whose latest release carries a matching asset
    matching: HashSet<String>,
    /// Artificial probe latency per full_name
    probe_delays: HashMap<String, Duration>,
    search_calls: AtomicU32,
    probes_completed: AtomicU32,
}

impl ScriptedForge {
    fn new(provider: Provider, pages: Vec<Result<Vec<RepositorySummary>>>) -> Self {
        Self {
            provider,
            pages: Mutex::new(pages),
            matching: HashSet::new(),
            probe_delays: HashMap::new(),
            search_calls: AtomicU32::new(0),
            probes_completed: AtomicU32::new(0),
        }
    }

    fn with_matches(mut self, ids: &[i64]) -> Self {
        self.matching = ids.iter().map(|id| format!("owner/repo{}", id)).collect();
        self
    }

    fn with_probe_delay(mut self, id: i64, delay: Duration) -> Self {
        self.probe_delays
            .insert(format!("owner/repo{}", id), delay);
        self
    }
}

#[async_trait]
impl ForgeClient for ScriptedForge {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn search_repositories(
        &self,
        _query: &RepoQuery,
        _page: u32,
        _per_page: u32,
    ) -> Result<Vec<RepositorySummary>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(Vec::new())
        } else {
            pages.remove(0)
        }
    }

    async fn list_recent_releases(&self, full_name: &str) -> Result<Vec<ReleaseSummary>> {
        if let Some(delay) = self.probe_delays.get(full_name) {
            tokio::time::sleep(*delay).await;
        }
        self.probes_completed.fetch_add(1, Ordering::SeqCst);
        if self.matching.contains(full_name) {
            Ok(vec![apk_release()])
        } else {
            Ok(vec![docs_release()])
        }
    }

    async fn get_repository_by_id(&self, _id: i64) -> Result<RepositorySummary> {
        unimplemented!("not used by the pipeline")
    }

    async fn get_latest_release(
        &self,
        _owner: &str,
        _repo: &str,
        _default_branch: &str,
    ) -> Result<Option<ReleaseSummary>> {
        unimplemented!("not used by the pipeline")
    }

    async fn get_readme(
        &self,
        _owner: &str,
        _repo: &str,
        _default_branch: &str,
    ) -> Result<Option<String>> {
        unimplemented!("not used by the pipeline")
    }

    async fn get_repo_stats(&self, _owner: &str, _repo: &str) -> Result<RepoStats> {
        unimplemented!("not used by the pipeline")
    }

    async fn get_user_profile(&self, _username: &str) -> Result<UserProfile> {
        unimplemented!("not used by the pipeline")
    }
}

async fn collect(
    client: Arc<ScriptedForge>,
    state: Arc<AppStateManager>,
    desired: usize,
) -> Vec<PaginatedBatch> {
    let pipeline = DiscoveryPipeline::new(client, state, TargetPlatform::Android);
    let query = RepoQuery {
        text: "topic:android".into(),
        sort: Some("stars".into()),
        order: "desc".into(),
        min_stars: 0,
    };
    let mut stream = pipeline.run(query, 1, desired);
    let mut batches = Vec::new();
    while let Some(batch) = stream.next().await {
        batches.push(batch);
    }
    batches
}

fn item_ids(batches: &[PaginatedBatch]) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|b| b.items.iter().map(|r| r.id))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

/// Two pages, hits at candidate ranks {3, 7, 40} and {120}: first batch after
/// the third hit in candidate order, final batch carrying the page-2 hit with
/// `has_more = false` because page 2 came back short.
#[tokio::test]
async fn two_page_mobile_scenario() {
    let page1: Vec<_> = (0..100).map(|i| make_repo(i, 1000)).collect();
    let page2: Vec<_> = (100..160).map(|i| make_repo(i, 1000)).collect();
    let client = Arc::new(
        ScriptedForge::new(Provider::GitHub, vec![Ok(page1), Ok(page2)])
            .with_matches(&[3, 7, 40, 120]),
    );

    let batches = collect(client.clone(), make_state(), 10).await;

    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[0].items.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![3, 7, 40]
    );
    assert!(batches[0].has_more);
    assert_eq!(batches[0].next_page_index, 2);

    assert_eq!(
        batches[1].items.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![120]
    );
    assert!(!batches[1].has_more, "short page 2 means no more data");

    assert_eq!(client.search_calls.load(Ordering::SeqCst), 2);
}

/// The concatenation of all batches equals the matching candidates in their
/// original order, with no duplicates - even when an early probe is the
/// slowest one in flight.
#[tokio::test]
async fn emission_order_is_candidate_order_not_completion_order() {
    let page: Vec<_> = (0..30).map(|i| make_repo(i, 1000)).collect();
    let client = Arc::new(
        ScriptedForge::new(Provider::GitHub, vec![Ok(page)])
            .with_matches(&[2, 5, 11, 17, 23])
            // Rank 2 finishes long after ranks 5..23 would
            .with_probe_delay(2, Duration::from_millis(120)),
    );

    let batches = collect(client, make_state(), 10).await;
    let ids = item_ids(&batches);
    assert_eq!(ids, vec![2, 5, 11, 17, 23]);

    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "no duplicates");
}

/// With full pages and no hits the loop performs exactly the page-cap number
/// of fetches, then reports one empty terminal batch.
#[tokio::test]
async fn stops_at_page_cap() {
    let pages: Vec<_> = (0..8)
        .map(|p| Ok((p * 100..(p + 1) * 100).map(|i| make_repo(i, 1000)).collect()))
        .collect();
    let client = Arc::new(ScriptedForge::new(Provider::GitHub, pages));

    let batches = collect(client.clone(), make_state(), 10).await;

    assert_eq!(client.search_calls.load(Ordering::SeqCst), 5);
    assert_eq!(batches.len(), 1);
    assert!(batches[0].items.is_empty());
    assert!(!batches[0].has_more);
}

/// Reaching the desired count stops paging and leaves `has_more` true.
#[tokio::test]
async fn stops_when_desired_count_reached() {
    let page: Vec<_> = (0..50).map(|i| make_repo(i, 1000)).collect();
    let matches: Vec<i64> = (0..15).collect();
    let client = Arc::new(
        ScriptedForge::new(
            Provider::GitHub,
            vec![Ok(page), Ok((100..200).map(|i| make_repo(i, 1000)).collect())],
        )
        .with_matches(&matches),
    );

    let batches = collect(client.clone(), make_state(), 10).await;

    assert_eq!(client.search_calls.load(Ordering::SeqCst), 1);
    let ids = item_ids(&batches);
    assert_eq!(ids, (0..10).collect::<Vec<i64>>());
    assert!(batches.iter().all(|b| b.has_more));
}

/// Incremental emission happens every three confirmed hits.
#[tokio::test]
async fn emits_every_three_hits() {
    let page: Vec<_> = (0..40).map(|i| make_repo(i, 1000)).collect();
    let client = Arc::new(
        ScriptedForge::new(Provider::GitHub, vec![Ok(page)]).with_matches(&[0, 1, 2, 3, 4, 5, 6]),
    );

    let batches = collect(client, make_state(), 10).await;

    // 7 hits on a short page: [0,1,2], [3,4,5] incremental, [6] final
    assert_eq!(
        batches.iter().map(|b| b.items.len()).collect::<Vec<_>>(),
        vec![3, 3, 1]
    );
    assert!(batches[0].has_more);
    assert!(batches[1].has_more);
    assert!(!batches[2].has_more);
}

/// A rate-limit failure mid-run ends the stream with what was already
/// emitted and surfaces the condition on the side channel, not the stream.
#[tokio::test]
async fn rate_limit_aborts_via_side_channel() {
    let page1: Vec<_> = (0..100).map(|i| make_repo(i, 1000)).collect();
    let client = Arc::new(
        ScriptedForge::new(
            Provider::GitHub,
            vec![
                Ok(page1),
                Err(ApiError::RateLimitExceeded {
                    snapshot: exhausted_snapshot(Provider::GitHub),
                }),
            ],
        )
        .with_matches(&[0, 1, 2]),
    );

    let state = make_state();
    let batches = collect(client, state.clone(), 10).await;

    assert_eq!(item_ids(&batches), vec![0, 1, 2]);
    assert!(
        state.state().github_rate_limit.is_some(),
        "exhaustion lands on the side channel"
    );
}

/// Unauthenticated GitLab discovery asks for sign-in and emits one empty
/// terminal batch without touching the API.
#[tokio::test]
async fn gitlab_unauthenticated_raises_prompt() {
    let client = Arc::new(ScriptedForge::new(Provider::GitLab, vec![]));
    let state = make_state();

    let batches = collect(client.clone(), state.clone(), 10).await;

    assert_eq!(client.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(batches.len(), 1);
    assert!(batches[0].items.is_empty());
    assert!(!batches[0].has_more);
    assert_eq!(state.state().auth_prompt, Some(Provider::GitLab));
}

/// Once signed in, GitLab discovery applies the star floor client-side and
/// stops early when a descending-stars page falls below it.
#[tokio::test]
async fn gitlab_star_floor_early_stop() {
    // Full page sorted by stars descending whose tail is below the floor
    let page: Vec<_> = (0..100).map(|i| make_repo(i, 150 - i)).collect();
    let client = Arc::new(
        ScriptedForge::new(
            Provider::GitLab,
            vec![Ok(page), Ok((200..300).map(|i| make_repo(i, 1)).collect())],
        )
        .with_matches(&[0, 1]),
    );

    let state = make_state();
    sign_in_gitlab(&state).await;

    let pipeline = DiscoveryPipeline::new(client.clone(), state, TargetPlatform::Android);
    let query = RepoQuery {
        text: "android".into(),
        sort: Some("star_count".into()),
        order: "desc".into(),
        min_stars: 100,
    };
    let mut stream = pipeline.run(query, 1, 10);
    let mut batches = Vec::new();
    while let Some(batch) = stream.next().await {
        batches.push(batch);
    }

    assert_eq!(client.search_calls.load(Ordering::SeqCst), 1, "no second page");
    // Only repos at or above the floor were eligible
    assert_eq!(item_ids(&batches), vec![0, 1]);
    assert!(!batches.last().unwrap().has_more);
}

/// Dropping the stream cancels the engine and its in-flight probes.
#[tokio::test]
async fn dropping_stream_cancels_probes() {
    let page: Vec<_> = (0..10).map(|i| make_repo(i, 1000)).collect();
    let mut forge = ScriptedForge::new(Provider::GitHub, vec![Ok(page)]).with_matches(&[0]);
    for i in 0..10 {
        forge
            .probe_delays
            .insert(format!("owner/repo{}", i), Duration::from_millis(200));
    }
    let client = Arc::new(forge);

    let pipeline = DiscoveryPipeline::new(client.clone(), make_state(), TargetPlatform::Android);
    let stream = pipeline.run(
        RepoQuery {
            text: "q".into(),
            sort: None,
            order: "desc".into(),
            min_stars: 0,
        },
        1,
        10,
    );

    // Let the engine fetch the page and launch probes, then cancel
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        client.probes_completed.load(Ordering::SeqCst),
        0,
        "no probe may complete after cancellation"
    );
}

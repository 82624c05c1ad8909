use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::db::models::{
    CorrectScoreRow, HalfFullTimeRow, MatchRow, SyncStatusRow, TotalGoalsRow, WinDrawLoseRow,
};
use crate::db::store::MatchQuery;
use crate::db::OddsStore;
use crate::error::AppError;
use crate::scheduler::SyncScheduler;
use crate::types::{OddsType, SyncCounts};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<SyncScheduler>,
    pub store: OddsStore,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/sync", post(post_sync))
        .route("/api/matches", get(get_matches))
        .route("/api/matches/:id", get(get_match))
        .route("/api/matches/:id/plays", get(get_match_plays))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MatchesQuery {
    pub date: Option<String>,
    pub league: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl MatchesQuery {
    /// Out-of-range paging is clamped rather than rejected.
    fn into_store_query(self) -> MatchQuery {
        MatchQuery {
            date: self.date.filter(|d| !d.is_empty()),
            league: self.league.filter(|l| !l.is_empty()),
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sync: SyncStatusRow,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub message: &'static str,
    pub stats: SyncCounts,
}

#[derive(Serialize)]
pub struct MatchResponse {
    #[serde(flatten)]
    pub info: MatchRow,
    pub is_latest_issue: bool,
    pub wdl: Vec<WinDrawLoseRow>,
}

#[derive(Serialize)]
pub struct MatchPage {
    pub items: Vec<MatchResponse>,
    pub total: i64,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
}

#[derive(Serialize)]
pub struct Plays {
    pub had: Option<WinDrawLoseRow>,
    pub hhad: Option<WinDrawLoseRow>,
    pub crs: Vec<CorrectScoreRow>,
    pub ttg: Vec<TotalGoalsRow>,
    pub hafu: Vec<HalfFullTimeRow>,
}

#[derive(Serialize)]
pub struct PlaysResponse {
    #[serde(rename = "match")]
    pub info: MatchResponse,
    pub plays: Plays,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let sync = state.store.sync_status().await?;
    Ok(Json(HealthResponse { status: "ok", sync }))
}

async fn post_sync(State(state): State<ApiState>) -> Result<Json<SyncResponse>, AppError> {
    match state.scheduler.trigger().await {
        Ok(stats) => Ok(Json(SyncResponse { message: "ok", stats })),
        Err(e) => {
            if matches!(e, AppError::SyncInProgress) {
                warn!("Manual sync rejected: a cycle is already running");
            }
            Err(e)
        }
    }
}

async fn get_matches(
    State(state): State<ApiState>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<MatchPage>, AppError> {
    let query = params.into_store_query();
    let (rows, total) = state.store.list_matches(&query, Utc::now()).await?;

    let ids: Vec<String> = rows.iter().map(|r| r.match_id.clone()).collect();
    let mut wdl_by_match: HashMap<String, Vec<WinDrawLoseRow>> = HashMap::new();
    for row in state.store.win_draw_lose_for(&ids).await? {
        wdl_by_match.entry(row.match_id.clone()).or_default().push(row);
    }
    let latest = state.store.latest_issue().await?;

    let items = rows
        .into_iter()
        .map(|info| {
            let wdl = wdl_by_match.remove(&info.match_id).unwrap_or_default();
            match_response(info, wdl, latest.as_deref())
        })
        .collect();

    Ok(Json(MatchPage {
        items,
        total,
        page: query.page,
        page_size: query.page_size,
    }))
}

async fn get_match(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchResponse>, AppError> {
    Ok(Json(load_match(&state.store, &match_id).await?))
}

async fn get_match_plays(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Result<Json<PlaysResponse>, AppError> {
    let info = load_match(&state.store, &match_id).await?;

    let pick = |kind: OddsType| {
        info.wdl
            .iter()
            .find(|r| r.odds_type == kind.to_string())
            .cloned()
    };
    let plays = Plays {
        had: pick(OddsType::Had),
        hhad: pick(OddsType::Hhad),
        crs: state.store.correct_scores(&match_id).await?,
        ttg: state.store.total_goals(&match_id).await?,
        hafu: state.store.half_full_time(&match_id).await?,
    };

    Ok(Json(PlaysResponse { info, plays }))
}

async fn load_match(store: &OddsStore, match_id: &str) -> Result<MatchResponse, AppError> {
    let info = store
        .get_match(match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("match {match_id}")))?;
    let wdl = store.win_draw_lose_for(&[info.match_id.clone()]).await?;
    let latest = store.latest_issue().await?;
    Ok(match_response(info, wdl, latest.as_deref()))
}

fn match_response(info: MatchRow, wdl: Vec<WinDrawLoseRow>, latest: Option<&str>) -> MatchResponse {
    let is_latest_issue = matches!(
        (info.match_number.as_deref(), latest),
        (Some(number), Some(latest)) if number == latest
    );
    MatchResponse {
        info,
        is_latest_issue,
        wdl,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Notify;

    use super::*;
    use crate::db::memory_pool;
    use crate::fetcher::PoolFetcher;
    use crate::sync::tests::{full_script, ScriptedFetcher};
    use crate::sync::SyncService;

    /// Holds the first fetch until released, then answers from the script.
    struct HeldFetcher {
        inner: ScriptedFetcher,
        held: AtomicBool,
        release: Notify,
    }

    #[async_trait]
    impl PoolFetcher for HeldFetcher {
        async fn fetch(&self, pool_code: &str) -> crate::error::Result<Value> {
            if !self.held.swap(true, Ordering::SeqCst) {
                self.release.notified().await;
            }
            self.inner.fetch(pool_code).await
        }
    }

    async fn serve(state: ApiState) -> String {
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    /// Serves the router on an ephemeral port backed by a synced in-memory store.
    async fn serve_synced() -> String {
        let store = OddsStore::new(memory_pool().await);
        let service = SyncService::new(Arc::new(full_script()), store.clone());
        let scheduler = SyncScheduler::new(service, Duration::from_secs(600));
        scheduler.trigger().await.unwrap();
        serve(ApiState { scheduler, store }).await
    }

    async fn get_json(url: String) -> (u16, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn health_reports_ledger() {
        let base = serve_synced().await;
        let (status, body) = get_json(format!("{base}/api/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sync"]["total_matches"], 2);
        assert_eq!(body["sync"]["total_odds"], 7);
        assert!(body["sync"]["last_synced_at"].is_string());
    }

    #[tokio::test]
    async fn manual_sync_returns_counts() {
        let base = serve_synced().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/sync"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "ok");
        assert_eq!(body["stats"]["matches"], 2);
        assert_eq!(body["stats"]["odds"], 7);
    }

    #[tokio::test]
    async fn manual_sync_finishes_after_client_disconnects() {
        let store = OddsStore::new(memory_pool().await);
        let fetcher = Arc::new(HeldFetcher {
            inner: full_script(),
            held: AtomicBool::new(false),
            release: Notify::new(),
        });
        let service = SyncService::new(fetcher.clone(), store.clone());
        let scheduler = SyncScheduler::new(service, Duration::from_secs(600));
        let base = serve(ApiState {
            scheduler,
            store: store.clone(),
        })
        .await;

        let impatient = reqwest::Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .unwrap();
        let sent = impatient.post(format!("{base}/api/sync")).send().await;
        assert!(sent.is_err(), "request should time out while the fetch is held");

        fetcher.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.sync_status().await.unwrap().last_synced_at.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("cycle should complete without the client");

        assert_eq!(fetcher.inner.calls.lock().unwrap().len(), 4);
        let status = store.sync_status().await.unwrap();
        assert_eq!((status.total_matches, status.total_odds), (2, 7));
    }

    #[tokio::test]
    async fn listing_clamps_page_size() {
        let base = serve_synced().await;
        let (status, body) = get_json(format!("{base}/api/matches?page=0&page_size=500")).await;
        assert_eq!(status, 200);
        assert_eq!(body["page"], 1);
        assert_eq!(body["pageSize"], MAX_PAGE_SIZE);
        // Match 2 is finished and hidden; match 1 kicked off in 2024 and is
        // hidden from the undated listing.
        assert_eq!(body["total"], 0);

        let (_, dated) = get_json(format!("{base}/api/matches?date=2024-06-01")).await;
        assert_eq!(dated["total"], 1);
        let item = &dated["items"][0];
        assert_eq!(item["match_id"], "1");
        assert_eq!(item["wdl"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_match_is_404() {
        let base = serve_synced().await;
        let (status, body) = get_json(format!("{base}/api/matches/999")).await;
        assert_eq!(status, 404);
        assert!(body["error"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn plays_split_markets() {
        let base = serve_synced().await;
        let (status, body) = get_json(format!("{base}/api/matches/1/plays")).await;
        assert_eq!(status, 200);
        assert_eq!(body["match"]["match_id"], "1");
        assert_eq!(body["plays"]["had"]["win_odds"], 1.85);
        assert_eq!(body["plays"]["hhad"]["handicap"], -1.0);
        assert_eq!(body["plays"]["crs"].as_array().unwrap().len(), 3);
        assert_eq!(body["plays"]["ttg"].as_array().unwrap().len(), 2);
        assert!(body["plays"]["hafu"].as_array().unwrap().is_empty());
    }
}

//! HTTP trigger surface and the periodic incremental pass.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::mirror::{MirrorApi, MirrorDatabases, MirrorReport};
use crate::progress::ProgressReport;
use crate::sync::{EventReport, NoopProgress, SyncReport};
use crate::{HevySync, PushOptions, Status};

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<HevySync>,
    /// Absent when no mirror token is configured; pipeline requests then fail.
    pub mirror: Option<Arc<dyn MirrorApi>>,
    pub secret: Arc<str>,
}

impl AppState {
    pub fn new(app: HevySync, mirror: Option<Arc<dyn MirrorApi>>, secret: &str) -> Self {
        Self {
            app: Arc::new(app),
            mirror,
            secret: Arc::from(secret),
        }
    }

    fn mirror(&self) -> Result<&dyn MirrorApi> {
        self.mirror
            .as_deref()
            .ok_or_else(|| Error::Config("NOTION_TOKEN is not set".into()))
    }
}

// ── Request / response bodies ────────────────────────────────────

/// Optional `/sync` body naming the workout-tree databases.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest {
    workouts_db_id: Option<String>,
    exercises_db_id: Option<String>,
    sets_db_id: Option<String>,
}

impl From<SyncRequest> for MirrorDatabases {
    fn from(req: SyncRequest) -> Self {
        MirrorDatabases {
            workouts: req.workouts_db_id,
            exercises: req.exercises_db_id,
            sets: req.sets_db_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    incremental: EventReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<ProgressReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mirror: Option<MirrorReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FullSyncResponse {
    full: SyncReport,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Error body: `{"error": message}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        log::error!("Request failed: {e}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/sync", post(sync))
        .route("/full-sync", post(full_sync))
        .route("/status", get(status))
        .layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn require_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == &*state.secret => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Incremental pull. With a body, also recompute progress and push.
async fn sync(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<SyncResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice::<SyncRequest>(&body).map_err(|e| ApiError {
                status: StatusCode::BAD_REQUEST,
                message: format!("invalid request body: {e}"),
            })?,
        )
    };

    let response = run_sync(&state, request.map(MirrorDatabases::from)).await?;
    Ok(Json(response))
}

async fn full_sync(
    State(state): State<AppState>,
) -> std::result::Result<Json<FullSyncResponse>, ApiError> {
    let full = state.app.sync_full(&NoopProgress).await?;
    Ok(Json(FullSyncResponse { full }))
}

async fn status(State(state): State<AppState>) -> std::result::Result<Json<Status>, ApiError> {
    Ok(Json(state.app.status().await?))
}

/// Pull events, then, when `push_to` is given, recompute progress and push
/// with `push_to` ids taking precedence over stored ones.
///
/// Push configuration is resolved before the pull so that a missing token or
/// database id leaves the cursor and local records untouched.
async fn run_sync(state: &AppState, push_to: Option<MirrorDatabases>) -> Result<SyncResponse> {
    let target = match push_to {
        Some(explicit) => {
            let mirror = state.mirror()?;
            let databases = explicit.or(state.app.mirror_databases().await?);
            databases.workout_tree()?;
            Some((mirror, databases))
        }
        None => None,
    };

    let incremental = state.app.sync_incremental(&NoopProgress).await?;
    let Some((mirror, databases)) = target else {
        return Ok(SyncResponse {
            incremental,
            progress: None,
            mirror: None,
        });
    };

    let progress = state.app.recompute_progress().await?;
    let report = state
        .app
        .push(mirror, databases, PushOptions::default())
        .await?;
    Ok(SyncResponse {
        incremental,
        progress: Some(progress),
        mirror: Some(report),
    })
}

// ── Scheduler ────────────────────────────────────────────────────

/// One scheduled run: the full pipeline when a mirror and stored workout
/// databases exist, otherwise a pull only.
async fn scheduled_pass(state: &AppState) -> Result<SyncResponse> {
    let push_to = match &state.mirror {
        Some(_) if state.app.mirror_databases().await?.workout_tree().is_ok() => {
            Some(MirrorDatabases::default())
        }
        _ => None,
    };
    run_sync(state, push_to).await
}

/// Run [`scheduled_pass`] every `every`, starting one interval from now.
pub fn spawn_scheduler(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match scheduled_pass(&state).await {
                Ok(r) => log::info!(
                    "Scheduled sync: {} updated, {} deleted, {} mirrored",
                    r.incremental.updated,
                    r.incremental.deleted,
                    r.mirror.map(|m| m.synced).unwrap_or(0)
                ),
                Err(e) => log::error!("Scheduled sync failed: {e}"),
            }
        }
    })
}

/// Serve the HTTP surface on `port` with the scheduler running alongside.
pub async fn serve(state: AppState, port: u16, every: Duration) -> Result<()> {
    let scheduler = spawn_scheduler(state.clone(), every);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Listening on {addr}, syncing every {}s", every.as_secs());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("cannot bind {addr}: {e}")))?;

    let result = axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Other(format!("server error: {e}")));
    scheduler.abort();
    result
}

// crates/server/src/routes/job.rs
//! API routes for the alignment job slot.
//!
//! - GET  /job         - Current job snapshot
//! - GET  /job/stream  - SSE stream of job snapshots
//! - GET  /job/dock    - Dock rendering of the job (or null)
//! - POST /job/start   - Start a job, superseding any previous one
//! - POST /job/open    - Show the job surface
//! - POST /job/close   - Hide the job surface
//! - POST /job/reopen  - Show the surface from the dock
//! - POST /job/clear   - Cancel and reset the slot

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use iep_align_jobs::{DockView, JobPayload, JobSnapshot};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/job - Current job snapshot.
async fn get_job(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    Json(state.coordinator.snapshot())
}

/// GET /api/job/stream - SSE stream of job snapshots.
///
/// Sends the current snapshot first, then one event per state transition.
/// Intermediate states may be coalesced for a slow reader.
async fn stream_job(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.coordinator.watch();

    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let json = serde_json::to_string(&snapshot).unwrap_or_default();
            yield Ok(Event::default().event("job").data(json));
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/job/dock - Dock view, `null` while idle.
async fn get_dock(State(state): State<Arc<AppState>>) -> Json<Option<DockView>> {
    Json(DockView::from_record(&state.coordinator.snapshot().record))
}

/// POST /api/job/start - Start an alignment job.
async fn start_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobSnapshot>)> {
    let Json(payload) = payload?;
    let job_id = state.coordinator.start(payload);
    tracing::debug!(job_id = %job_id, "Job start accepted");
    Ok((StatusCode::ACCEPTED, Json(state.coordinator.snapshot())))
}

async fn open_surface(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    state.coordinator.open();
    Json(state.coordinator.snapshot())
}

async fn close_surface(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    state.coordinator.close();
    Json(state.coordinator.snapshot())
}

async fn reopen_surface(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    state.coordinator.reopen();
    Json(state.coordinator.snapshot())
}

/// POST /api/job/clear - Cancel anything in flight and reset to idle.
async fn clear_job(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    state.coordinator.clear();
    Json(state.coordinator.snapshot())
}

/// Build the job router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/job", get(get_job))
        .route("/job/stream", get(stream_job))
        .route("/job/dock", get(get_dock))
        .route("/job/start", post(start_job))
        .route("/job/open", post(open_surface))
        .route("/job/close", post(close_surface))
        .route("/job/reopen", post(reopen_surface))
        .route("/job/clear", post(clear_job))
}

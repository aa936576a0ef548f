// crates/server/src/routes/toast.rs
//! API routes for notifications and the live toast.
//!
//! - GET  /notifications/stream - SSE stream of notifications as they are published
//! - GET  /toast                - The live toast, or null
//! - POST /toast/dismiss        - Hide the live toast
//! - POST /toast/activate       - Click the live toast and run its action

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use iep_align_jobs::{dispatch, Notification};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/notifications/stream - Notifications published after the client
/// connects. Nothing is replayed.
async fn stream_notifications(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.coordinator.subscribe_notifications();

    let stream = async_stream::stream! {
        let mut subscription = subscription;
        while let Some(notification) = subscription.recv().await {
            let json = serde_json::to_string(&notification).unwrap_or_default();
            yield Ok(Event::default().event("notification").data(json));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/toast
async fn get_toast(State(state): State<Arc<AppState>>) -> Json<Option<Notification>> {
    Json(state.toast.current())
}

/// POST /api/toast/dismiss
async fn dismiss_toast(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    if state.toast.dismiss() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No live notification".into()))
    }
}

/// POST /api/toast/activate - Hide the toast and run its action, returning
/// the activated notification.
async fn activate_toast(State(state): State<Arc<AppState>>) -> ApiResult<Json<Notification>> {
    let notification = state
        .toast
        .activate()
        .ok_or_else(|| ApiError::NotFound("No live notification".into()))?;

    if let Some(action) = notification.action {
        tracing::debug!(title = %notification.title, ?action, "Activating notification");
        dispatch(action, &state.coordinator);
    }
    Ok(Json(notification))
}

/// Build the notification and toast router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/stream", get(stream_notifications))
        .route("/toast", get(get_toast))
        .route("/toast/dismiss", post(dismiss_toast))
        .route("/toast/activate", post(activate_toast))
}

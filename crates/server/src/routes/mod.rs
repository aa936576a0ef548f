//! API route handlers for the alignment job server.

pub mod health;
pub mod job;
pub mod toast;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/job - Current job snapshot
/// - GET  /api/job/stream - SSE stream of job snapshots
/// - GET  /api/job/dock - Dock view of the job
/// - POST /api/job/start - Start an alignment job
/// - POST /api/job/open, /close, /reopen - Job surface visibility
/// - POST /api/job/clear - Cancel and reset the job slot
/// - GET  /api/notifications/stream - SSE stream of notifications
/// - GET  /api/toast - Live toast
/// - POST /api/toast/dismiss - Hide the live toast
/// - POST /api/toast/activate - Run the live toast's action
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", job::router())
        .nest("/api", toast::router())
        .with_state(state)
}

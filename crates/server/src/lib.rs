// crates/server/src/lib.rs
//! HTTP surface for the single-slot alignment job tracker.
//!
//! Serves the job snapshot, dock and toast views over a REST + SSE API, and
//! wires the coordinator from [`AlignConfig`].

pub mod error;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use iep_align_jobs::{
    AlignConfig, FileJobStore, HttpAlignmentClient, JobCoordinator, JobStore, MemoryJobStore,
    NotificationChannel,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Pick the job store for `config`: a file slot under the data directory, or
/// an in-memory slot when persistence is off or no data directory exists.
pub fn job_store(config: &AlignConfig) -> Arc<dyn JobStore> {
    if !config.persist {
        return Arc::new(MemoryJobStore::new());
    }
    match config.slot_dir() {
        Some(dir) => Arc::new(FileJobStore::in_dir(&dir)),
        None => {
            tracing::warn!("No data directory available; alignment job will not survive restarts");
            Arc::new(MemoryJobStore::new())
        }
    }
}

/// Build the coordinator for `config` against the HTTP alignment backend.
pub fn build_coordinator(config: &AlignConfig) -> JobCoordinator {
    JobCoordinator::new(
        Arc::new(HttpAlignmentClient::from_config(config)),
        job_store(config),
        NotificationChannel::new(),
    )
}

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, job, notifications, toast)
/// - CORS for the browser UI (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// crates/server/src/state.rs
//! Application state shared across all routes.

use std::time::Instant;

use iep_align_jobs::{JobCoordinator, ToastHost};

/// Shared application state for the Axum server.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub coordinator: JobCoordinator,
    /// The one live toast, fed from the coordinator's notification channel.
    pub toast: ToastHost,
}

impl AppState {
    /// Wrap `coordinator` and start a toast host on its channel. Must be
    /// called from within a tokio runtime.
    pub fn new(coordinator: JobCoordinator) -> Self {
        let toast = ToastHost::spawn(coordinator.notifications());
        Self {
            start_time: Instant::now(),
            coordinator,
            toast,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

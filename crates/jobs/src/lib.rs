// crates/jobs/src/lib.rs
//! Single-slot alignment job tracker.
//!
//! Provides:
//! - `JobCoordinator` - runs at most one alignment request at a time,
//!   cancels on restart and discards stale completions
//! - `JobStore` - durable slot for the current `JobRecord`
//! - `NotificationChannel` - pub/sub for ephemeral notifications
//! - `DockView` / `ToastHost` - passive observers for the UI layer
//! - `HttpAlignmentClient` - the backend alignment endpoint

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod observers;
pub mod paths;
pub mod store;
pub mod summary;
pub mod types;

pub use client::{AlignRequest, AlignmentClient, HttpAlignmentClient};
pub use config::AlignConfig;
pub use coordinator::JobCoordinator;
pub use error::{AlignError, StoreError};
pub use notify::{Notification, NotificationAction, NotificationChannel, NotificationSubscription};
pub use observers::{dispatch, DockView, ToastHost, TOAST_TTL};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
pub use summary::{AlignMatrix, AlignResult, JobSummary};
pub use types::{JobHandle, JobId, JobPayload, JobRecord, JobSnapshot, JobStatus};

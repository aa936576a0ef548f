// crates/jobs/src/coordinator.rs
//! Owner of the one alignment job.
//!
//! The coordinator serializes access to the job slot: starting a job cancels
//! whatever was in flight, every settlement is checked against the live job
//! id before it touches state, and each transition is written through to the
//! [`JobStore`] before any notification goes out.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{oneshot, watch};

use crate::client::{AlignRequest, AlignmentClient};
use crate::error::AlignError;
use crate::notify::{Notification, NotificationAction, NotificationChannel, NotificationSubscription};
use crate::store::JobStore;
use crate::summary::{AlignResult, JobSummary};
use crate::types::{JobHandle, JobId, JobPayload, JobRecord, JobSnapshot, JobStatus};

pub const READY_TITLE: &str = "Alignment ready. Open to view";
pub const FAILED_TITLE: &str = "Alignment failed. Click to retry";

/// Cloneable handle to the single job coordinator of an application.
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn AlignmentClient>,
    store: Arc<dyn JobStore>,
    notifications: NotificationChannel,
    state: Mutex<SlotState>,
    snapshot_tx: watch::Sender<JobSnapshot>,
}

struct SlotState {
    record: JobRecord,
    surface_open: bool,
    /// Set by `reopen()` on a finished job: the next `close()` clears it.
    clear_on_close: bool,
    last_id: Option<JobId>,
    inflight: Option<JobHandle>,
}

impl SlotState {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            record: self.record.clone(),
            is_surface_open: self.surface_open,
        }
    }
}

impl JobCoordinator {
    /// Build the coordinator, hydrating the job slot from `store` once.
    ///
    /// A record that was `running` when it was persisted comes back as
    /// `running` with nothing in flight; it stays that way until the user
    /// starts a new job or clears it.
    pub fn new(
        client: Arc<dyn AlignmentClient>,
        store: Arc<dyn JobStore>,
        notifications: NotificationChannel,
    ) -> Self {
        let record = store.load();
        match record.status() {
            JobStatus::Running => tracing::warn!(
                job_id = ?record.job_id(),
                "Rehydrated a running alignment job with no request in flight; not retrying"
            ),
            JobStatus::Idle => {}
            status => tracing::info!(job_id = ?record.job_id(), %status, "Rehydrated alignment job"),
        }

        let now = Utc::now();
        let last_id = record.job_id().filter(|id| {
            let plausible = id.is_plausible_at(now);
            if !plausible {
                tracing::warn!(job_id = %id, "Persisted job id is ahead of the clock; not seeding the id counter from it");
            }
            plausible
        });

        let state = SlotState {
            last_id,
            record,
            surface_open: false,
            clear_on_close: false,
            inflight: None,
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());

        Self {
            inner: Arc::new(Inner {
                client,
                store,
                notifications,
                state: Mutex::new(state),
                snapshot_tx,
            }),
        }
    }

    /// Start a new alignment job, superseding any previous one.
    ///
    /// Returns as soon as the job is recorded; the request runs on a spawned
    /// task. Must be called from within a tokio runtime.
    pub fn start(&self, payload: JobPayload) -> JobId {
        let payload = payload.normalized();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let started_at = Utc::now();

        let job_id = {
            let mut state = self.inner.lock_state();
            if let Some(previous) = state.inflight.take() {
                let previous_id = previous.id;
                previous.cancel();
                tracing::info!(job_id = %previous_id, "Superseded in-flight alignment job");
            }

            let job_id = JobId::mint(started_at, state.last_id).unwrap_or_else(|| {
                tracing::warn!(last_id = ?state.last_id, "Job id counter exhausted; restarting from the clock");
                JobId::from_clock(started_at)
            });
            state.last_id = Some(job_id);
            state.record = JobRecord::running(job_id, payload.clone(), started_at);
            state.surface_open = true;
            state.clear_on_close = false;
            state.inflight = Some(JobHandle::new(job_id, cancel_tx));
            self.inner.persist(&state);
            self.inner.publish_snapshot(&state);
            job_id
        };

        tracing::info!(
            job_id = %job_id,
            students = payload.students.len(),
            courses = payload.courses.len(),
            units = payload.units.len(),
            "Starting alignment job"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_job(payload, job_id, cancel_rx).await;
        });

        job_id
    }

    /// Cancel anything in flight and reset the slot to idle.
    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        self.inner.reset(&mut state);
        self.inner.publish_snapshot(&state);
    }

    /// Teardown variant of [`clear`](Self::clear) for logout or shutdown:
    /// also closes the surface.
    pub fn hard_clear(&self) {
        let mut state = self.inner.lock_state();
        self.inner.reset(&mut state);
        state.surface_open = false;
        self.inner.publish_snapshot(&state);
        tracing::info!("Hard-cleared alignment job slot");
    }

    pub fn open(&self) {
        let mut state = self.inner.lock_state();
        state.surface_open = true;
        self.inner.publish_snapshot(&state);
    }

    /// Close the surface. A finished job reopened via [`reopen`](Self::reopen)
    /// is cleared on close.
    pub fn close(&self) {
        let mut state = self.inner.lock_state();
        state.surface_open = false;
        if state.clear_on_close && state.record.status() == JobStatus::Done {
            tracing::debug!(job_id = ?state.record.job_id(), "Clearing viewed alignment job on close");
            self.inner.reset(&mut state);
        }
        self.inner.publish_snapshot(&state);
    }

    /// Open the surface from the dock. On a finished job this arms
    /// clear-on-close.
    pub fn reopen(&self) {
        let mut state = self.inner.lock_state();
        state.surface_open = true;
        if state.record.status() == JobStatus::Done {
            state.clear_on_close = true;
        }
        self.inner.publish_snapshot(&state);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.lock_state().snapshot()
    }

    /// Receiver that observes every state transition.
    pub fn watch(&self) -> watch::Receiver<JobSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Id of the job whose request is still in flight, if any.
    pub fn in_flight(&self) -> Option<JobId> {
        self.inner.lock_state().inflight.as_ref().map(|h| h.id)
    }

    pub fn notifications(&self) -> &NotificationChannel {
        &self.inner.notifications
    }

    pub fn publish_notification(
        &self,
        title: impl Into<String>,
        action: Option<NotificationAction>,
    ) -> usize {
        let mut notification = Notification::new(title);
        notification.action = action;
        self.inner.notifications.publish(notification)
    }

    pub fn subscribe_notifications(&self) -> NotificationSubscription {
        self.inner.notifications.subscribe()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| {
            tracing::error!("Mutex poisoned on alignment job state");
            e.into_inner()
        })
    }

    fn persist(&self, state: &SlotState) {
        if let Err(e) = self.store.save(&state.record) {
            tracing::warn!(error = %e, status = %state.record.status(), "Failed to persist alignment job");
        }
    }

    fn publish_snapshot(&self, state: &SlotState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    fn reset(&self, state: &mut SlotState) {
        if let Some(handle) = state.inflight.take() {
            let job_id = handle.id;
            handle.cancel();
            tracing::info!(job_id = %job_id, "Cancelled in-flight alignment job");
        }
        state.clear_on_close = false;
        state.record = JobRecord::Idle;
        if let Err(e) = self.store.remove() {
            tracing::warn!(error = %e, "Failed to remove persisted alignment job");
        }
    }

    async fn run_job(
        self: Arc<Self>,
        payload: JobPayload,
        job_id: JobId,
        cancel_rx: oneshot::Receiver<()>,
    ) {
        let request = AlignRequest::from(&payload);
        let outcome = tokio::select! {
            _ = cancel_rx => {
                tracing::debug!(job_id = %job_id, "Alignment request aborted");
                return;
            }
            outcome = self.client.align(&request) => outcome,
        };
        self.settle(job_id, outcome);
    }

    /// Apply the outcome of `job_id`'s request. Returns false when the job is
    /// no longer the live one and the outcome was discarded.
    fn settle(&self, job_id: JobId, outcome: Result<AlignResult, AlignError>) -> bool {
        let finished_at = Utc::now();
        let notification = {
            let mut state = self.lock_state();
            let is_live = state.inflight.as_ref().is_some_and(|h| h.id == job_id)
                && state.record.job_id() == Some(job_id);
            if !is_live {
                tracing::debug!(job_id = %job_id, "Discarding stale alignment outcome");
                return false;
            }
            state.inflight = None;

            let running = std::mem::take(&mut state.record);
            let (settled, notification) = match outcome {
                Ok(result) => {
                    let summary = JobSummary::from_result(&result);
                    tracing::info!(
                        job_id = %job_id,
                        students = summary.student_count,
                        worksheets = summary.worksheet_count,
                        overall = ?summary.overall,
                        "Alignment job done"
                    );
                    (
                        running.complete(summary, result, finished_at),
                        Notification::new(READY_TITLE).with_action(NotificationAction::OpenSurface),
                    )
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Alignment job failed");
                    (
                        running.fail(e.to_string(), finished_at),
                        Notification::new(FAILED_TITLE).with_action(NotificationAction::OpenSurface),
                    )
                }
            };
            state.record = settled.unwrap_or_else(|unchanged| unchanged);

            self.persist(&state);
            self.publish_snapshot(&state);
            notification
        };

        self.notifications.publish(notification);
        true
    }
}

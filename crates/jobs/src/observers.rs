// crates/jobs/src/observers.rs
//! Passive views over the coordinator and the notification channel.
//!
//! - `DockView` - compact status indicator for the current job
//! - `ToastHost` - holds the one live notification and expires it
//! - `dispatch` - runs a notification's action against the coordinator

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::coordinator::JobCoordinator;
use crate::notify::{Notification, NotificationAction, NotificationChannel, NotificationSubscription};
use crate::types::{JobRecord, JobStatus};

/// How long a notification stays up unless replaced.
pub const TOAST_TTL: Duration = Duration::from_secs(5);

/// Dock rendering of the job slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockView {
    pub indicator: JobStatus,
    pub label: &'static str,
    /// Clearing is offered only once the job has settled.
    pub can_clear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_line: Option<String>,
}

impl DockView {
    /// `None` when there is nothing to show.
    pub fn from_record(record: &JobRecord) -> Option<Self> {
        let label = match record.status() {
            JobStatus::Idle => return None,
            JobStatus::Running => "Alignment running…",
            JobStatus::Done => "Alignment ready",
            JobStatus::Error => "Alignment error",
        };
        let summary_line = record.summary().and_then(|s| {
            s.overall.map(|overall| {
                format!(
                    "Overall: {overall}% • Students: {} • Worksheets: {}",
                    s.student_count, s.worksheet_count
                )
            })
        });

        Some(Self {
            indicator: record.status(),
            label,
            can_clear: record.status() != JobStatus::Running,
            summary_line,
        })
    }
}

/// Keeps the most recent notification visible for [`TOAST_TTL`].
///
/// A new notification replaces the current one and restarts the countdown.
/// Dropping the host stops its task and releases its subscription.
pub struct ToastHost {
    current: Arc<watch::Sender<Option<Notification>>>,
    task: JoinHandle<()>,
}

impl ToastHost {
    /// Subscribe to `channel` and start the host task. Must be called from
    /// within a tokio runtime.
    pub fn spawn(channel: &NotificationChannel) -> Self {
        Self::with_ttl(channel, TOAST_TTL)
    }

    pub fn with_ttl(channel: &NotificationChannel, ttl: Duration) -> Self {
        let subscription = channel.subscribe();
        let (tx, _) = watch::channel(None);
        let current = Arc::new(tx);
        let task = tokio::spawn(run_toast_host(subscription, Arc::clone(&current), ttl));
        Self { current, task }
    }

    pub fn current(&self) -> Option<Notification> {
        self.current.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Notification>> {
        self.current.subscribe()
    }

    /// Hide the current notification. Returns false if nothing was showing.
    pub fn dismiss(&self) -> bool {
        self.current.send_replace(None).is_some()
    }

    /// Take the current notification as the user clicks it; the toast is
    /// hidden and the caller runs its action.
    pub fn activate(&self) -> Option<Notification> {
        self.current.send_replace(None)
    }
}

impl Drop for ToastHost {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_toast_host(
    mut subscription: NotificationSubscription,
    current: Arc<watch::Sender<Option<Notification>>>,
    ttl: Duration,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            received = subscription.recv() => match received {
                Some(notification) => {
                    current.send_replace(Some(notification));
                    deadline = Some(Instant::now() + ttl);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                current.send_replace(None);
            }
        }
    }
}

/// Run a notification action.
pub fn dispatch(action: NotificationAction, coordinator: &JobCoordinator) {
    match action {
        NotificationAction::OpenSurface => coordinator.open(),
    }
}

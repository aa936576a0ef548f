// crates/jobs/src/types.rs
//! Types for the single-slot alignment job.

use std::collections::HashSet;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::summary::{AlignResult, JobSummary};

/// Identifiers selected for one alignment run.
///
/// Each field is a set carried as a sequence; [`JobPayload::normalized`]
/// drops repeats while keeping first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub units: Vec<String>,
}

impl JobPayload {
    pub fn new<S, C, U>(students: S, courses: C, units: U) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            students: students.into_iter().map(Into::into).collect(),
            courses: courses.into_iter().map(Into::into).collect(),
            units: units.into_iter().map(Into::into).collect(),
        }
        .normalized()
    }

    /// Remove duplicate identifiers from every set.
    pub fn normalized(self) -> Self {
        Self {
            students: dedup(self.students),
            courses: dedup(self.courses),
            units: dedup(self.units),
        }
    }
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Status of the job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier minted per `start()`.
///
/// Derived from the start time in milliseconds and kept strictly increasing,
/// so a completion can always be matched against the start that produced it.
/// Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct JobId(u64);

/// How far ahead of the clock a persisted id may be and still seed the counter.
const MAX_FUTURE_SKEW_MS: u64 = 24 * 60 * 60 * 1000;

impl JobId {
    /// Mint the next id for a start at `now`, never reusing `last`.
    ///
    /// `None` when `last` is already the largest representable id.
    pub fn mint(now: DateTime<Utc>, last: Option<JobId>) -> Option<Self> {
        let fresh = Self::from_clock(now);
        match last {
            Some(JobId(prev)) if prev >= fresh.0 => prev.checked_add(1).map(JobId),
            _ => Some(fresh),
        }
    }

    /// The id a clock reading of `now` yields, ignoring earlier ids.
    pub fn from_clock(now: DateTime<Utc>) -> Self {
        JobId(millis(now))
    }

    /// Whether this id could have been minted by a clock reading `now`.
    ///
    /// Ids further in the future than a day of clock skew come from a
    /// tampered or foreign slot and must not seed the counter.
    pub fn is_plausible_at(self, now: DateTime<Utc>) -> bool {
        self.0 <= millis(now).saturating_add(MAX_FUTURE_SKEW_MS)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

fn millis(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(JobId)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for JobId {
    type Error = ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The durable unit of state held in the job slot.
///
/// Each status carries exactly the fields that are valid for it, so a `done`
/// record always has a summary and no error, an `error` record always has a
/// message and no summary, and an `idle` record has no payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobRecord {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Running {
        job_id: JobId,
        payload: JobPayload,
        started_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        job_id: JobId,
        payload: JobPayload,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        summary: JobSummary,
        result: AlignResult,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        job_id: JobId,
        payload: JobPayload,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: String,
    },
}

impl JobRecord {
    pub fn running(job_id: JobId, payload: JobPayload, started_at: DateTime<Utc>) -> Self {
        Self::Running {
            job_id,
            payload,
            started_at,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            Self::Idle => JobStatus::Idle,
            Self::Running { .. } => JobStatus::Running,
            Self::Done { .. } => JobStatus::Done,
            Self::Error { .. } => JobStatus::Error,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Idle => None,
            Self::Running { job_id, .. } | Self::Done { job_id, .. } | Self::Error { job_id, .. } => {
                Some(*job_id)
            }
        }
    }

    pub fn payload(&self) -> Option<&JobPayload> {
        match self {
            Self::Idle => None,
            Self::Running { payload, .. } | Self::Done { payload, .. } | Self::Error { payload, .. } => {
                Some(payload)
            }
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Idle => None,
            Self::Running { started_at, .. }
            | Self::Done { started_at, .. }
            | Self::Error { started_at, .. } => Some(*started_at),
        }
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Done { finished_at, .. } | Self::Error { finished_at, .. } => Some(*finished_at),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&JobSummary> {
        match self {
            Self::Done { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AlignResult> {
        match self {
            Self::Done { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Settle a running record successfully. Any other status is handed back
    /// unchanged as the error.
    pub(crate) fn complete(
        self,
        summary: JobSummary,
        result: AlignResult,
        finished_at: DateTime<Utc>,
    ) -> Result<Self, Self> {
        match self {
            Self::Running {
                job_id,
                payload,
                started_at,
            } => Ok(Self::Done {
                job_id,
                payload,
                started_at,
                finished_at,
                summary,
                result,
            }),
            other => Err(other),
        }
    }

    /// Settle a running record with a failure. Any other status is handed back
    /// unchanged as the error.
    pub(crate) fn fail(self, error: String, finished_at: DateTime<Utc>) -> Result<Self, Self> {
        match self {
            Self::Running {
                job_id,
                payload,
                started_at,
            } => Ok(Self::Error {
                job_id,
                payload,
                started_at,
                finished_at,
                error,
            }),
            other => Err(other),
        }
    }
}

/// Handle to the in-flight request of one job, used for cancellation.
pub struct JobHandle {
    pub id: JobId,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, cancel_tx: oneshot::Sender<()>) -> Self {
        Self {
            id,
            cancel_tx: Some(cancel_tx),
        }
    }

    /// Cancel the job. Returns true if the cancellation signal was sent.
    pub fn cancel(mut self) -> bool {
        if let Some(tx) = self.cancel_tx.take() {
            tx.send(()).is_ok()
        } else {
            false
        }
    }
}

/// Read-only view of the coordinator handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub record: JobRecord,
    pub is_surface_open: bool,
}

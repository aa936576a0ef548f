use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use iep_align_jobs::coordinator::{FAILED_TITLE, READY_TITLE};
use iep_align_jobs::{
    dispatch, AlignError, AlignRequest, AlignResult, AlignmentClient, FileJobStore, JobCoordinator,
    JobPayload, JobRecord, JobSnapshot, JobStatus, JobStore, MemoryJobStore, NotificationAction,
    NotificationChannel, ToastHost,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[derive(Clone)]
enum Outcome {
    Ok(Value),
    Fail(&'static str),
}

/// Alignment backend keyed by the first student id: each key answers after
/// a fixed delay with a fixed outcome.
#[derive(Default)]
struct ScriptedClient {
    scripts: HashMap<String, (Duration, Outcome)>,
    requests: Mutex<Vec<AlignRequest>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self::default()
    }

    fn script(mut self, student: &str, delay: Duration, outcome: Outcome) -> Self {
        self.scripts.insert(student.to_string(), (delay, outcome));
        self
    }

    fn requests(&self) -> Vec<AlignRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlignmentClient for ScriptedClient {
    async fn align(&self, request: &AlignRequest) -> Result<AlignResult, AlignError> {
        self.requests.lock().unwrap().push(request.clone());
        let key = request.student_ids.first().cloned().unwrap_or_default();
        let (delay, outcome) = self
            .scripts
            .get(&key)
            .cloned()
            .unwrap_or_else(|| panic!("no script for student {key}"));

        tokio::time::sleep(delay).await;
        match outcome {
            Outcome::Ok(value) => Ok(serde_json::from_value(value).unwrap()),
            Outcome::Fail(body) => Err(AlignError::Endpoint {
                status: 500,
                body: body.to_string(),
            }),
        }
    }
}

fn result_json() -> Value {
    json!({
        "meta": { "pipeline": "iep" },
        "matrix": { "students": ["s1"], "worksheets": ["w1", "w2"] },
        "details": { "s1": { "w1": 80, "w2": 90 } },
        "row_averages": [80, 90],
        "column_averages": [70],
    })
}

fn payload(student: &str) -> JobPayload {
    JobPayload::new([student], ["c1"], ["u1"])
}

async fn wait_for_status(coordinator: &JobCoordinator, status: JobStatus) -> JobSnapshot {
    let mut rx = coordinator.watch();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(600),
        rx.wait_for(|s| s.record.status() == status),
    )
    .await
    .expect("timeout waiting for status")
    .expect("coordinator dropped")
    .clone();
    snapshot
}

fn assert_status_invariant(record: &JobRecord) {
    match record.status() {
        JobStatus::Idle => assert!(record.payload().is_none()),
        JobStatus::Running => assert!(record.summary().is_none() && record.error().is_none()),
        JobStatus::Done => assert!(record.summary().is_some() && record.error().is_none()),
        JobStatus::Error => assert!(record.error().is_some() && record.summary().is_none()),
    }
    let json = serde_json::to_value(record).unwrap();
    assert_eq!(json["status"], record.status().as_str());
    assert_eq!(json.get("summary").is_some(), record.status() == JobStatus::Done);
    assert_eq!(json.get("error").is_some(), record.status() == JobStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn start_runs_to_done_and_notifies() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client.clone(), store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    let id = coordinator.start(JobPayload::new(["s1", "s1"], ["c1"], ["u1"]));

    let running = coordinator.snapshot();
    assert_eq!(running.record.status(), JobStatus::Running);
    assert_eq!(running.record.job_id(), Some(id));
    assert_eq!(running.record.payload().unwrap().students, vec!["s1"]);
    assert!(running.is_surface_open);
    assert_eq!(store.load(), running.record);
    assert_status_invariant(&running.record);

    let done = wait_for_status(&coordinator, JobStatus::Done).await;
    assert_eq!(done.record.job_id(), Some(id));
    assert_status_invariant(&done.record);

    let summary = done.record.summary().unwrap();
    assert_eq!(summary.overall, Some(80.0));
    assert_eq!(summary.student_count, 1);
    assert_eq!(summary.worksheet_count, 2);
    assert_eq!(
        done.record.result().unwrap().extra["details"]["s1"]["w2"],
        json!(90)
    );
    assert!(done.record.finished_at() >= done.record.started_at());

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.title, READY_TITLE);
    assert_eq!(notification.action, Some(NotificationAction::OpenSurface));

    assert_eq!(
        client.requests(),
        vec![AlignRequest {
            student_ids: vec!["s1".into()],
            courses: vec!["c1".into()],
            units: vec!["u1".into()],
        }]
    );
    assert_eq!(store.load(), done.record);
    assert_eq!(coordinator.in_flight(), None);
}

#[tokio::test(start_paused = true)]
async fn endpoint_failure_records_error() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Fail("model unavailable"),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    let id = coordinator.start(payload("s1"));
    let failed = wait_for_status(&coordinator, JobStatus::Error).await;

    assert_eq!(failed.record.job_id(), Some(id));
    assert_eq!(failed.record.error(), Some("model unavailable"));
    assert_eq!(failed.record.payload(), Some(&payload("s1")));
    assert_status_invariant(&failed.record);
    assert_eq!(store.load(), failed.record);

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.title, FAILED_TITLE);
    assert_eq!(notification.action, Some(NotificationAction::OpenSurface));
}

#[tokio::test(start_paused = true)]
async fn restart_supersedes_slow_success() {
    let client = Arc::new(
        ScriptedClient::new()
            .script("slow", Duration::from_secs(10), Outcome::Ok(result_json()))
            .script("fast", Duration::from_secs(1), Outcome::Ok(result_json())),
    );
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    let first = coordinator.start(payload("slow"));
    let second = coordinator.start(payload("fast"));
    assert!(second > first);

    let done = wait_for_status(&coordinator, JobStatus::Done).await;
    assert_eq!(done.record.job_id(), Some(second));
    assert!(notifications.recv().await.is_some());

    // Well past the point where the first request would have answered.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(coordinator.snapshot().record, done.record);
    assert_eq!(store.load().job_id(), Some(second));
    assert!(notifications.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn restart_supersedes_slow_failure() {
    let client = Arc::new(
        ScriptedClient::new()
            .script("slow", Duration::from_secs(10), Outcome::Fail("late failure"))
            .script("fast", Duration::from_secs(1), Outcome::Ok(result_json())),
    );
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    coordinator.start(payload("slow"));
    let second = coordinator.start(payload("fast"));

    wait_for_status(&coordinator, JobStatus::Done).await;
    notifications.recv().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let record = coordinator.snapshot().record;
    assert_eq!(record.status(), JobStatus::Done);
    assert_eq!(record.job_id(), Some(second));
    assert_eq!(store.load(), record);
    assert!(notifications.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn restart_while_first_would_finish_first() {
    let client = Arc::new(
        ScriptedClient::new()
            .script("a", Duration::from_secs(5), Outcome::Ok(result_json()))
            .script("b", Duration::from_secs(10), Outcome::Fail("b failed")),
    );
    let coordinator = JobCoordinator::new(
        client.clone(),
        Arc::new(MemoryJobStore::new()),
        NotificationChannel::new(),
    );
    let mut notifications = coordinator.subscribe_notifications();

    coordinator.start(payload("a"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = coordinator.start(payload("b"));

    // "a" would have answered at t=5s.
    tokio::time::sleep(Duration::from_secs(6)).await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.record.status(), JobStatus::Running);
    assert_eq!(snapshot.record.job_id(), Some(second));
    assert!(notifications.try_recv().is_none());

    let failed = wait_for_status(&coordinator, JobStatus::Error).await;
    assert_eq!(failed.record.job_id(), Some(second));
    assert_eq!(failed.record.error(), Some("b failed"));
    assert_eq!(notifications.recv().await.unwrap().title, FAILED_TITLE);
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rapid_restarts_mint_increasing_ids() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));
    let coordinator =
        JobCoordinator::new(client, Arc::new(MemoryJobStore::new()), NotificationChannel::new());

    let ids: Vec<_> = (0..5).map(|_| coordinator.start(payload("s1"))).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(coordinator.in_flight(), ids.last().copied());

    let done = wait_for_status(&coordinator, JobStatus::Done).await;
    assert_eq!(done.record.job_id(), ids.last().copied());
}

#[tokio::test]
async fn clear_is_idempotent() {
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(
        Arc::new(ScriptedClient::new()),
        store.clone(),
        NotificationChannel::new(),
    );

    coordinator.clear();
    coordinator.clear();

    assert!(coordinator.snapshot().record.is_idle());
    assert_eq!(coordinator.in_flight(), None);
    assert_eq!(store.load(), JobRecord::Idle);
}

#[tokio::test(start_paused = true)]
async fn clear_cancels_running_job() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(5),
        Outcome::Ok(result_json()),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    coordinator.start(payload("s1"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    coordinator.clear();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = coordinator.snapshot();
    assert!(snapshot.record.is_idle());
    assert_status_invariant(&snapshot.record);
    assert_eq!(coordinator.in_flight(), None);
    assert!(store.raw().is_none());
    assert!(notifications.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn done_record_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));

    let coordinator = JobCoordinator::new(
        client.clone(),
        Arc::new(FileJobStore::in_dir(dir.path())),
        NotificationChannel::new(),
    );
    coordinator.start(payload("s1"));
    let done = wait_for_status(&coordinator, JobStatus::Done).await;
    drop(coordinator);

    let reloaded = JobCoordinator::new(
        client,
        Arc::new(FileJobStore::in_dir(dir.path())),
        NotificationChannel::new(),
    );
    let snapshot = reloaded.snapshot();
    assert_eq!(snapshot.record, done.record);
    assert!(!snapshot.is_surface_open);
    assert_eq!(reloaded.in_flight(), None);
}

#[tokio::test(start_paused = true)]
async fn running_record_is_rehydrated_without_retry() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(3600),
        Outcome::Ok(result_json()),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client.clone(), store.clone(), NotificationChannel::new());
    let stale = coordinator.start(payload("s1"));
    let persisted = store.raw().unwrap();
    coordinator.clear();

    // Fresh process over the slot as it was while the request was out.
    let reloaded = JobCoordinator::new(
        client.clone(),
        Arc::new(MemoryJobStore::with_raw(persisted)),
        NotificationChannel::new(),
    );
    let snapshot = reloaded.snapshot();
    assert_eq!(snapshot.record.status(), JobStatus::Running);
    assert_eq!(snapshot.record.job_id(), Some(stale));
    assert_eq!(reloaded.in_flight(), None);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(reloaded.snapshot().record.status(), JobStatus::Running);

    let next = reloaded.start(payload("s1"));
    assert!(next > stale);
}

#[tokio::test]
async fn corrupt_slot_hydrates_idle() {
    let store = Arc::new(MemoryJobStore::with_raw("{\"status\":\"done\",\"jobId\":17"));
    let coordinator = JobCoordinator::new(
        Arc::new(ScriptedClient::new()),
        store,
        NotificationChannel::new(),
    );
    assert!(coordinator.snapshot().record.is_idle());

    let dir = tempfile::tempdir().unwrap();
    let file_store = FileJobStore::in_dir(dir.path());
    std::fs::write(file_store.path(), b"\xff\xfe not json").unwrap();
    let coordinator = JobCoordinator::new(
        Arc::new(ScriptedClient::new()),
        Arc::new(file_store),
        NotificationChannel::new(),
    );
    assert!(coordinator.snapshot().record.is_idle());
}

#[tokio::test(start_paused = true)]
async fn reopen_then_close_clears_finished_job() {
    let client = Arc::new(
        ScriptedClient::new()
            .script("ok", Duration::from_secs(1), Outcome::Ok(result_json()))
            .script("bad", Duration::from_secs(1), Outcome::Fail("nope")),
    );
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());

    coordinator.start(payload("ok"));
    wait_for_status(&coordinator, JobStatus::Done).await;

    // A plain close keeps the result.
    coordinator.close();
    let snapshot = coordinator.snapshot();
    assert!(!snapshot.is_surface_open);
    assert_eq!(snapshot.record.status(), JobStatus::Done);

    coordinator.reopen();
    assert!(coordinator.snapshot().is_surface_open);
    coordinator.close();
    let snapshot = coordinator.snapshot();
    assert!(snapshot.record.is_idle());
    assert!(!snapshot.is_surface_open);
    assert!(store.raw().is_none());

    // Failed jobs stay visible after being viewed.
    coordinator.start(payload("bad"));
    wait_for_status(&coordinator, JobStatus::Error).await;
    coordinator.reopen();
    coordinator.close();
    assert_eq!(coordinator.snapshot().record.status(), JobStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn store_is_written_before_notification() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let coordinator = JobCoordinator::new(client, store.clone(), NotificationChannel::new());
    let mut notifications = coordinator.subscribe_notifications();

    coordinator.start(payload("s1"));
    notifications.recv().await.unwrap();

    assert_eq!(store.load().status(), JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn toast_action_reopens_surface() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));
    let coordinator =
        JobCoordinator::new(client, Arc::new(MemoryJobStore::new()), NotificationChannel::new());
    let toast = ToastHost::spawn(coordinator.notifications());
    let mut toast_rx = toast.watch();

    coordinator.start(payload("s1"));
    coordinator.close();
    assert!(!coordinator.snapshot().is_surface_open);

    toast_rx.wait_for(|n| n.is_some()).await.unwrap();
    let notification = toast.activate().unwrap();
    dispatch(notification.action.unwrap(), &coordinator);

    let snapshot = coordinator.snapshot();
    assert!(snapshot.is_surface_open);
    assert_eq!(snapshot.record.status(), JobStatus::Done);
    assert!(toast.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn late_subscriber_misses_notification() {
    let client = Arc::new(ScriptedClient::new().script(
        "s1",
        Duration::from_secs(1),
        Outcome::Ok(result_json()),
    ));
    let coordinator =
        JobCoordinator::new(client, Arc::new(MemoryJobStore::new()), NotificationChannel::new());
    let mut early = coordinator.subscribe_notifications();

    coordinator.start(payload("s1"));
    early.recv().await.unwrap();

    let mut late = coordinator.subscribe_notifications();
    assert!(late.try_recv().is_none());
}

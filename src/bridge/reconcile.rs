//! Background reconciliation of local issue status against the tracker.
//!
//! One job per tracker ID. A job compares the stored status with the remote
//! one every interval and overwrites the local value when they differ. Jobs
//! end when stopped, when their issue is deleted, or on shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::db::DbHandle;
use super::models::StepNote;
use super::tracker::IssueTracker;
use crate::config::StepLogSection;

/// Result of a single comparison cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Updated { from: String, to: String },
    /// The tracker could not be asked; nothing was written.
    RemoteUnavailable,
    IssueMissing,
}

/// Compare one issue's stored status with the tracker and fix it up.
pub async fn reconcile_once(
    db: &DbHandle,
    tracker: &dyn IssueTracker,
    tracker_id: &str,
    actors: &StepLogSection,
) -> Result<ReconcileOutcome> {
    let id = tracker_id.to_string();
    let local = match db.call(move |db| db.get_status(&id)).await? {
        Some(status) => status,
        None => return Ok(ReconcileOutcome::IssueMissing),
    };

    let Some(remote) = tracker.current_status(tracker_id).await else {
        return Ok(ReconcileOutcome::RemoteUnavailable);
    };

    if remote == local {
        return Ok(ReconcileOutcome::Unchanged);
    }

    let note = StepNote {
        reporter_name: actors.reporter_name.clone(),
        supporter_name: actors.supporter_name.clone(),
        description: format!("Status synced from tracker: {} -> {}", local, remote),
    };
    let id = tracker_id.to_string();
    let status = remote.clone();
    let updated = db
        .call(move |db| db.set_status(&id, &status, &note))
        .await?;

    Ok(match updated {
        Some(_) => ReconcileOutcome::Updated {
            from: local,
            to: remote,
        },
        None => ReconcileOutcome::IssueMissing,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Started,
    AlreadyRunning,
    Stopped,
    NotRunning,
}

struct Job {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of running reconciliation jobs keyed by tracker ID.
#[derive(Clone)]
pub struct ReconcileRegistry {
    jobs: Arc<tokio::sync::Mutex<HashMap<String, Job>>>,
    generation: Arc<AtomicU64>,
    db: DbHandle,
    tracker: Arc<dyn IssueTracker>,
    interval: Duration,
    actors: StepLogSection,
}

impl ReconcileRegistry {
    pub fn new(
        db: DbHandle,
        tracker: Arc<dyn IssueTracker>,
        interval: Duration,
        actors: StepLogSection,
    ) -> Self {
        Self {
            jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            db,
            tracker,
            interval,
            actors,
        }
    }

    /// Start a job for `tracker_id` unless one is already running.
    pub async fn start(&self, tracker_id: &str) -> JobState {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get(tracker_id) {
            if !job.handle.is_finished() {
                return JobState::AlreadyRunning;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_job(
            self.clone(),
            tracker_id.to_string(),
            generation,
            token.clone(),
        ));
        jobs.insert(
            tracker_id.to_string(),
            Job {
                generation,
                token,
                handle,
            },
        );
        info!(tracker_id, generation, "reconciliation job started");
        JobState::Started
    }

    /// Cancel the job for `tracker_id`, if any.
    pub async fn stop(&self, tracker_id: &str) -> JobState {
        let removed = self.jobs.lock().await.remove(tracker_id);
        match removed {
            Some(job) => {
                job.token.cancel();
                info!(tracker_id, "reconciliation job stopped");
                JobState::Stopped
            }
            None => JobState::NotRunning,
        }
    }

    pub async fn is_running(&self, tracker_id: &str) -> bool {
        self.jobs
            .lock()
            .await
            .get(tracker_id)
            .is_some_and(|job| !job.handle.is_finished())
    }

    /// Tracker IDs with a registered job, sorted.
    pub async fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancel every job and wait for them to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Job)> = self.jobs.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "stopping reconciliation jobs");
        for (_, job) in &drained {
            job.token.cancel();
        }
        for (tracker_id, job) in drained {
            if let Err(e) = job.handle.await {
                error!(tracker_id = %tracker_id, error = %e, "reconciliation job panicked");
            }
        }
    }

    async fn remove_if_current(&self, tracker_id: &str, generation: u64) {
        let mut jobs = self.jobs.lock().await;
        if jobs
            .get(tracker_id)
            .is_some_and(|job| job.generation == generation)
        {
            jobs.remove(tracker_id);
        }
    }
}

async fn run_job(
    registry: ReconcileRegistry,
    tracker_id: String,
    generation: u64,
    token: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = reconcile_once(
                &registry.db,
                registry.tracker.as_ref(),
                &tracker_id,
                &registry.actors,
            ) => outcome,
        };

        match outcome {
            Ok(ReconcileOutcome::IssueMissing) => {
                info!(tracker_id = %tracker_id, "issue no longer stored, ending reconciliation");
                break;
            }
            Ok(ReconcileOutcome::Updated { from, to }) => {
                info!(
                    tracker_id = %tracker_id,
                    from = %from,
                    to = %to,
                    "status synced from tracker"
                );
            }
            Ok(outcome) => debug!(tracker_id = %tracker_id, ?outcome, "reconcile cycle"),
            Err(e) => error!(tracker_id = %tracker_id, error = %e, "reconcile cycle failed"),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(registry.interval) => {}
        }
    }

    registry.remove_if_current(&tracker_id, generation).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::db::BridgeDb;
    use crate::bridge::models::NewIssue;
    use crate::bridge::testutils::FakeTracker;

    fn setup() -> (DbHandle, Arc<FakeTracker>) {
        let db = DbHandle::new(BridgeDb::new_in_memory().unwrap());
        (db, Arc::new(FakeTracker::new()))
    }

    async fn seed(db: &DbHandle, tracker_id: &str) {
        let issue = NewIssue {
            tenant_id: "t".into(),
            vpc_id: "v".into(),
            region_id: "r".into(),
            issue_jira_id: tracker_id.into(),
            name: "n".into(),
            data_log: "log".into(),
            error_code: "vm_down".into(),
            status: "TO DO".into(),
            service: "VM".into(),
        };
        let note = StepNote {
            reporter_name: "xplat".into(),
            supporter_name: "xplat".into(),
            description: "opened".into(),
        };
        db.call(move |db| db.create_issue(&issue, &note))
            .await
            .unwrap()
            .unwrap();
    }

    async fn status_of(db: &DbHandle, tracker_id: &str) -> Option<String> {
        let id = tracker_id.to_string();
        db.call(move |db| db.get_status(&id)).await.unwrap()
    }

    fn registry(db: &DbHandle, tracker: &Arc<FakeTracker>, interval_ms: u64) -> ReconcileRegistry {
        ReconcileRegistry::new(
            db.clone(),
            tracker.clone(),
            Duration::from_millis(interval_ms),
            StepLogSection::default(),
        )
    }

    /// Wait up to two seconds for the stored status to become `expected`.
    async fn wait_for_status(db: &DbHandle, tracker_id: &str, expected: &str) -> bool {
        for _ in 0..100 {
            if status_of(db, tracker_id).await.as_deref() == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    async fn wait_for_exit(jobs: &ReconcileRegistry, tracker_id: &str) -> bool {
        for _ in 0..100 {
            if !jobs.is_running(tracker_id).await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reconcile_once_overwrites_on_mismatch() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "In Progress");

        let outcome = reconcile_once(&db, tracker.as_ref(), "10001", &StepLogSection::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated {
                from: "TO DO".into(),
                to: "In Progress".into()
            }
        );
        assert_eq!(status_of(&db, "10001").await.as_deref(), Some("In Progress"));

        let logs = db.call(|db| db.list_step_logs("10001")).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].status, "In Progress");
        assert!(logs[1].description.contains("TO DO -> In Progress"));
    }

    #[tokio::test]
    async fn test_reconcile_once_unchanged_when_equal() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "TO DO");

        let outcome = reconcile_once(&db, tracker.as_ref(), "10001", &StepLogSection::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        let logs = db.call(|db| db.list_step_logs("10001")).await.unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_once_remote_failure_writes_nothing() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "Done");
        tracker.set_failing(true);

        let outcome = reconcile_once(&db, tracker.as_ref(), "10001", &StepLogSection::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::RemoteUnavailable);
        assert_eq!(status_of(&db, "10001").await.as_deref(), Some("TO DO"));
    }

    #[tokio::test]
    async fn test_reconcile_once_missing_issue() {
        let (db, tracker) = setup();
        tracker.set_status("404", "Done");
        let outcome = reconcile_once(&db, tracker.as_ref(), "404", &StepLogSection::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::IssueMissing);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_ends_job() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "TO DO");
        let jobs = registry(&db, &tracker, 50);

        assert_eq!(jobs.start("10001").await, JobState::Started);
        assert_eq!(jobs.start("10001").await, JobState::AlreadyRunning);
        assert!(jobs.is_running("10001").await);
        assert_eq!(jobs.active().await, vec!["10001".to_string()]);

        assert_eq!(jobs.stop("10001").await, JobState::Stopped);
        assert!(!jobs.is_running("10001").await);
        assert_eq!(jobs.stop("10001").await, JobState::NotRunning);
    }

    #[tokio::test]
    async fn test_job_converges_to_remote_status() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "TO DO");
        let jobs = registry(&db, &tracker, 20);
        jobs.start("10001").await;

        tracker.set_status("10001", "Done");
        assert!(wait_for_status(&db, "10001", "Done").await);

        jobs.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_survives_remote_failures() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_failing(true);
        let jobs = registry(&db, &tracker, 20);
        jobs.start("10001").await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(jobs.is_running("10001").await);
        assert_eq!(status_of(&db, "10001").await.as_deref(), Some("TO DO"));

        tracker.set_failing(false);
        tracker.set_status("10001", "In Progress");
        assert!(wait_for_status(&db, "10001", "In Progress").await);
        jobs.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_ends_when_issue_deleted() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "TO DO");
        let jobs = registry(&db, &tracker, 20);
        jobs.start("10001").await;

        db.call(|db| db.delete_issue("10001")).await.unwrap();
        assert!(wait_for_exit(&jobs, "10001").await);
        assert!(jobs.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_restart_is_not_removed_by_stopped_job() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        tracker.set_status("10001", "TO DO");
        let jobs = registry(&db, &tracker, 20);

        jobs.start("10001").await;
        jobs.stop("10001").await;
        assert_eq!(jobs.start("10001").await, JobState::Started);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(jobs.is_running("10001").await);
        jobs.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_all_jobs() {
        let (db, tracker) = setup();
        seed(&db, "10001").await;
        seed(&db, "10002").await;
        let jobs = registry(&db, &tracker, 1000);
        jobs.start("10001").await;
        jobs.start("10002").await;
        assert_eq!(jobs.active().await.len(), 2);

        jobs.shutdown().await;
        assert!(jobs.active().await.is_empty());
        assert!(!jobs.is_running("10002").await);
    }
}

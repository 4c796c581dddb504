//! Background refresh jobs: queued ingestion runs executed one at a time.

use super::error::IngestError;
use super::{generate_run_id, log_run_result, Ingestor};
use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How long finished jobs stay queryable.
const FINISHED_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Status of a refresh job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the worker
    Queued,
    /// Ingestion is in progress
    Running,
    /// The run finished; counts come from its report
    Completed {
        records_written: usize,
        skipped_pairs: usize,
        unparsed_titles: usize,
    },
    /// The run failed (bad date, storage error, or timeout)
    Failed { reason: String },
}

impl JobStatus {
    /// Returns true once the job will not change again.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

/// A submitted refresh and where it stands.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub job_id: String,
    pub date: String,
    pub category: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

struct RefreshRequest {
    job_id: String,
    date: String,
    category: String,
}

/// Queue of refresh requests served by a single worker task.
pub struct RefreshQueue {
    sender: mpsc::UnboundedSender<RefreshRequest>,
    jobs: Arc<DashMap<String, JobInfo>>,
}

impl RefreshQueue {
    /// Spawns the worker and returns a handle for submitting jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(ingestor: Arc<Ingestor>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let jobs = Arc::new(DashMap::new());

        tokio::spawn(run_worker(ingestor, receiver, jobs.clone()));

        Self { sender, jobs }
    }

    /// Queues an ingestion run and returns its job id.
    ///
    /// The date is not validated here; a bad date shows up as a failed job.
    pub fn submit(&self, date: &str, category: &str) -> Result<String, IngestError> {
        self.prune_finished();

        let job_id = generate_run_id();
        self.jobs.insert(
            job_id.clone(),
            JobInfo {
                job_id: job_id.clone(),
                date: date.to_string(),
                category: category.to_string(),
                status: JobStatus::Queued,
                submitted_at: Local::now(),
                finished_at: None,
            },
        );

        let request = RefreshRequest {
            job_id: job_id.clone(),
            date: date.to_string(),
            category: category.to_string(),
        };

        if self.sender.send(request).is_err() {
            self.jobs.remove(&job_id);
            return Err(IngestError::QueueClosed);
        }

        info!(job_id = %job_id, date, category, "Refresh job queued");
        Ok(job_id)
    }

    /// Looks up a job by id.
    pub fn status(&self, job_id: &str) -> Option<JobInfo> {
        self.jobs.get(job_id).map(|entry| entry.clone())
    }

    /// Drops finished jobs older than the retention window.
    fn prune_finished(&self) {
        let now = Local::now();
        self.jobs.retain(|_, job| match job.finished_at {
            Some(finished) => (now - finished)
                .to_std()
                .map(|age| age < FINISHED_JOB_RETENTION)
                .unwrap_or(true),
            None => true,
        });
    }
}

async fn run_worker(
    ingestor: Arc<Ingestor>,
    mut receiver: mpsc::UnboundedReceiver<RefreshRequest>,
    jobs: Arc<DashMap<String, JobInfo>>,
) {
    info!("Refresh worker started");

    while let Some(request) = receiver.recv().await {
        set_status(&jobs, &request.job_id, JobStatus::Running);

        let result = ingestor
            .ingest_bounded(&request.date, &request.category)
            .await;
        log_run_result("refresh_job", &request.date, &request.category, &result);

        let status = match result {
            Ok(report) => JobStatus::Completed {
                records_written: report.records.len(),
                skipped_pairs: report.skipped_pairs,
                unparsed_titles: report.unparsed_titles,
            },
            Err(e) => JobStatus::Failed {
                reason: e.to_string(),
            },
        };
        set_status(&jobs, &request.job_id, status);
    }

    warn!("Refresh worker stopped: queue closed");
}

fn set_status(jobs: &DashMap<String, JobInfo>, job_id: &str, status: JobStatus) {
    if let Some(mut job) = jobs.get_mut(job_id) {
        if status.is_finished() {
            job.finished_at = Some(Local::now());
        }
        job.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::tests::{FakePages, SlowPages};
    use super::super::SourceConfig;
    use super::*;
    use crate::db::ReservationDbManager;

    fn queue() -> RefreshQueue {
        let db = Arc::new(ReservationDbManager::open_in_memory().unwrap());
        let sources = Arc::new(SourceConfig::empty());
        let ingestor = Arc::new(Ingestor::new(db, sources, Arc::new(FakePages::default())));
        RefreshQueue::start(ingestor)
    }

    async fn wait_until_finished(queue: &RefreshQueue, job_id: &str) -> JobInfo {
        for _ in 0..200 {
            if let Some(job) = queue.status(job_id) {
                if job.status.is_finished() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }

    #[tokio::test]
    async fn test_job_completes() {
        let queue = queue();
        let job_id = queue.submit("2024-06-16", "all").unwrap();

        let job = wait_until_finished(&queue, &job_id).await;
        assert_eq!(
            job.status,
            JobStatus::Completed {
                records_written: 0,
                skipped_pairs: 6,
                unparsed_titles: 0,
            }
        );
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_bad_date_fails_out_of_band() {
        let queue = queue();
        let job_id = queue.submit("bad-date", "all").unwrap();

        let job = wait_until_finished(&queue, &job_id).await;
        match job.status {
            JobStatus::Failed { reason } => assert!(reason.contains("bad-date")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timed_out_job_fails() {
        let db = Arc::new(ReservationDbManager::open_in_memory().unwrap());
        let sources = Arc::new(
            SourceConfig::from_json(
                r#"{"categories": {"드럼 연습실": {"Sun": "https://example.com/drum/sun"}}}"#,
            )
            .unwrap(),
        );
        let ingestor = Arc::new(
            Ingestor::new(db, sources, Arc::new(SlowPages))
                .with_run_timeout(Duration::from_millis(50)),
        );
        let queue = RefreshQueue::start(ingestor);
        let job_id = queue.submit("2024-06-16", "all").unwrap();

        let job = wait_until_finished(&queue, &job_id).await;
        match job.status {
            JobStatus::Failed { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_job() {
        assert!(queue().status("nope").is_none());
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(JobStatus::Failed {
            reason: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "x");
    }
}

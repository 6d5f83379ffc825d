pub mod handlers;

use fintrack_common::db::job_queue::{Dao as JobQueueDao, FailureDisposition};
use fintrack_common::db::DbThreadPool;
use fintrack_common::models::queued_job::{JobType, QueuedJob};

use async_trait::async_trait;
use chrono::Utc;
use futures::future;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::jobs::JobError;

/// Executes one kind of queued unit of work. Handlers must be safe to call
/// again with the same payload: a retried attempt re-runs from scratch.
#[async_trait]
pub trait QueuedJobHandler: Send + Sync {
    fn job_type(&self) -> JobType;
    async fn handle(&self, payload: serde_json::Value) -> Result<(), JobError>;
}

/// Pulls due jobs off the durable queue and fans them out to handlers. One
/// claimed batch runs concurrently; each job succeeds or fails on its own,
/// and a failure only ever reschedules or parks that one job.
pub struct WorkerPool {
    db_thread_pool: DbThreadPool,
    handlers: HashMap<JobType, Arc<dyn QueuedJobHandler>>,
    poll_interval: Duration,
    batch_size: i64,
}

impl WorkerPool {
    pub fn new(db_thread_pool: DbThreadPool, poll_interval: Duration, batch_size: i64) -> Self {
        Self {
            db_thread_pool,
            handlers: HashMap::new(),
            poll_interval,
            batch_size,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn QueuedJobHandler>) {
        log::info!(
            "Registered queue handler for job type \"{}\"",
            handler.job_type(),
        );

        self.handlers.insert(handler.job_type(), handler);
    }

    pub async fn start(&self) -> ! {
        loop {
            let dao = JobQueueDao::new(&self.db_thread_pool);
            let now = Utc::now().naive_utc();
            let batch_size = self.batch_size;

            let claimed =
                match tokio::task::spawn_blocking(move || dao.claim_due_jobs(now, batch_size))
                    .await
                {
                    Ok(Ok(jobs)) => jobs,
                    Ok(Err(e)) => {
                        log::error!("Failed to claim queued jobs: {}", e);
                        Vec::new()
                    }
                    Err(e) => {
                        log::error!("Failed to join Tokio task: {}", e);
                        Vec::new()
                    }
                };

            if claimed.is_empty() {
                time::sleep(self.poll_interval).await;
                continue;
            }

            let run_futures: Vec<_> = claimed
                .into_iter()
                .map(|job| self.run_job(job))
                .collect();

            future::join_all(run_futures).await;
        }
    }

    async fn run_job(&self, job: QueuedJob) {
        let outcome = match self.handlers.get(&job.job_type) {
            Some(handler) => handler.handle(job.payload.clone()).await,
            None => Err(JobError::UnknownJobType(job.job_type)),
        };

        let dao = JobQueueDao::new(&self.db_thread_pool);

        match outcome {
            Ok(()) => {
                log::info!("Job {} (\"{}\") finished successfully", job.id, job.job_type);

                let ack =
                    tokio::task::spawn_blocking(move || dao.mark_succeeded(job.id)).await;
                match ack {
                    Ok(Err(e)) => log::error!("Failed to mark job {} succeeded: {}", job.id, e),
                    Err(e) => log::error!("Failed to join Tokio task: {}", e),
                    Ok(Ok(())) => (),
                }
            }
            Err(e) => {
                log::error!(
                    "Job {} (\"{}\") attempt {} failed: {}",
                    job.id,
                    job.job_type,
                    job.attempts,
                    e,
                );

                let error_text = e.to_string();
                let job_id = job.id;
                let disposition = tokio::task::spawn_blocking(move || {
                    dao.record_failure(job_id, &error_text)
                })
                .await;

                match disposition {
                    Ok(Ok(FailureDisposition::Retry { run_at })) => {
                        log::info!("Job {} rescheduled for {}", job.id, run_at);
                    }
                    Ok(Ok(FailureDisposition::Exhausted)) => {
                        // The payload is the replay handle once a job is
                        // parked, so it goes to the log in full.
                        log::error!(
                            "Job {} (\"{}\") permanently failed; payload: {}",
                            job.id,
                            job.job_type,
                            job.payload,
                        );
                    }
                    Ok(Err(e)) => {
                        log::error!("Failed to record failure for job {}: {}", job.id, e)
                    }
                    Err(e) => log::error!("Failed to join Tokio task: {}", e),
                }
            }
        }
    }
}

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::queued_job::{JobStatus, JobType, NewQueuedJob, QueuedJob};
use crate::schema::queued_jobs as queued_job_fields;
use crate::schema::queued_jobs::dsl::queued_jobs;

/// Per-job retry configuration: `max_attempts` total attempts, with the
/// delay before retry `n` being `backoff_base_secs * 2^(n-1)` (5s/10s/20s
/// with the defaults).
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff_base_secs: i32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 5,
        }
    }
}

/// Delay before the next attempt, given how many attempts have already
/// completed (at least one).
pub fn backoff_delay(backoff_base_secs: i32, completed_attempts: i32) -> Duration {
    let doublings = (completed_attempts - 1).clamp(0, 30) as u32;
    Duration::seconds(i64::from(backoff_base_secs) << doublings)
}

/// What happens to a job after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum FailureDisposition {
    Retry { run_at: NaiveDateTime },
    Exhausted,
}

/// The enqueue-only face of the durable queue, for components that hand
/// work off without running it.
pub trait JobQueue: Send + Sync {
    fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<Uuid, DaoError>;
}

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<Uuid, DaoError> {
        let now = Utc::now().naive_utc();
        let job_id = Uuid::now_v7();

        let new_job = NewQueuedJob {
            id: job_id,
            job_type,
            payload: &payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: policy.max_attempts,
            backoff_base_secs: policy.backoff_base_secs,
            run_at: now,
            created_at: now,
            updated_at: now,
        };

        dsl::insert_into(queued_jobs)
            .values(&new_job)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(job_id)
    }

    /// Claims up to `limit` due jobs for this worker, skipping rows other
    /// workers hold locked, and bumps their attempt counters. Each claimed
    /// job is delivered to exactly one worker.
    pub fn claim_due_jobs(
        &self,
        as_of: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<QueuedJob>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let claimed_ids = queued_jobs
                    .select(queued_job_fields::id)
                    .filter(queued_job_fields::status.eq(JobStatus::Pending))
                    .filter(queued_job_fields::run_at.le(as_of))
                    .order(queued_job_fields::run_at.asc())
                    .limit(limit)
                    .for_update()
                    .skip_locked()
                    .get_results::<Uuid>(conn)?;

                if claimed_ids.is_empty() {
                    return Ok(Vec::new());
                }

                Ok(diesel::update(
                    queued_jobs.filter(queued_job_fields::id.eq_any(&claimed_ids)),
                )
                .set((
                    queued_job_fields::status.eq(JobStatus::Running),
                    queued_job_fields::attempts.eq(queued_job_fields::attempts + 1),
                    queued_job_fields::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_results::<QueuedJob>(conn)?)
            })
    }

    pub fn mark_succeeded(&self, job_id: Uuid) -> Result<(), DaoError> {
        diesel::update(queued_jobs.find(job_id))
            .set((
                queued_job_fields::status.eq(JobStatus::Succeeded),
                queued_job_fields::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    /// Records a failed attempt: reschedules with exponential backoff until
    /// the attempt budget is spent, then parks the job as FAILED.
    pub fn record_failure(
        &self,
        job_id: Uuid,
        error: &str,
    ) -> Result<FailureDisposition, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let job = queued_jobs
                    .find(job_id)
                    .get_result::<QueuedJob>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("queued job"))?;

                let now = Utc::now().naive_utc();

                if job.attempts >= job.max_attempts {
                    diesel::update(queued_jobs.find(job_id))
                        .set((
                            queued_job_fields::status.eq(JobStatus::Failed),
                            queued_job_fields::last_error.eq(error),
                            queued_job_fields::updated_at.eq(now),
                        ))
                        .execute(conn)?;

                    return Ok(FailureDisposition::Exhausted);
                }

                let run_at = now + backoff_delay(job.backoff_base_secs, job.attempts);

                diesel::update(queued_jobs.find(job_id))
                    .set((
                        queued_job_fields::status.eq(JobStatus::Pending),
                        queued_job_fields::run_at.eq(run_at),
                        queued_job_fields::last_error.eq(error),
                        queued_job_fields::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(FailureDisposition::Retry { run_at })
            })
    }
}

impl JobQueue for Dao {
    fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<Uuid, DaoError> {
        Dao::enqueue(self, job_type, payload, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_utils;

    #[test]
    fn test_backoff_delay_doubles_per_attempt() {
        assert_eq!(backoff_delay(5, 1), Duration::seconds(5));
        assert_eq!(backoff_delay(5, 2), Duration::seconds(10));
        assert_eq!(backoff_delay(5, 3), Duration::seconds(20));
        assert_eq!(backoff_delay(30, 2), Duration::seconds(60));
    }

    #[test]
    #[ignore = "requires a running Postgres instance (FINTRACK_TEST_DB_URI)"]
    fn test_enqueue_claim_and_success() {
        let dao = Dao::new(test_utils::db_thread_pool());

        let job_id = dao
            .enqueue(
                JobType::ProcessRecurring,
                serde_json::json!({ "recurring_id": Uuid::now_v7() }),
                RetryPolicy::default(),
            )
            .unwrap();

        let claimed = dao.claim_due_jobs(test_utils::now(), 100).unwrap();
        let job = claimed.iter().find(|j| j.id == job_id).expect("job not claimed");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);

        // A second claim must not hand the same job out again.
        let reclaimed = dao.claim_due_jobs(test_utils::now(), 100).unwrap();
        assert!(reclaimed.iter().all(|j| j.id != job_id));

        dao.mark_succeeded(job_id).unwrap();
    }

    #[test]
    #[ignore = "requires a running Postgres instance (FINTRACK_TEST_DB_URI)"]
    fn test_record_failure_backs_off_then_exhausts() {
        let dao = Dao::new(test_utils::db_thread_pool());

        let job_id = dao
            .enqueue(
                JobType::CheckBudgetLimit,
                serde_json::json!({ "expense_id": Uuid::now_v7() }),
                RetryPolicy {
                    max_attempts: 2,
                    backoff_base_secs: 5,
                },
            )
            .unwrap();

        dao.claim_due_jobs(test_utils::now(), 100).unwrap();
        let disposition = dao.record_failure(job_id, "boom").unwrap();
        assert!(matches!(disposition, FailureDisposition::Retry { .. }));

        // The retry is not due until the backoff elapses.
        assert!(dao
            .claim_due_jobs(test_utils::now(), 100)
            .unwrap()
            .iter()
            .all(|j| j.id != job_id));

        let claimed = dao
            .claim_due_jobs(test_utils::now() + Duration::seconds(6), 100)
            .unwrap();
        assert!(claimed.iter().any(|j| j.id == job_id));

        let disposition = dao.record_failure(job_id, "boom again").unwrap();
        assert_eq!(disposition, FailureDisposition::Exhausted);
    }
}

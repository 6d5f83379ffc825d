mod dispatch_due_recurring;

pub use dispatch_due_recurring::DispatchDueRecurringJob;

use fintrack_common::db::DaoError;
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use std::fmt;
use tokio::task::JoinError;

#[derive(Debug)]
pub enum JobError {
    DaoFailure(Option<DaoError>),
    ConcurrencyError(JoinError),
    InvalidPayload(serde_json::Error),
    UnknownJobType(JobType),
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::DaoFailure(e) => {
                if let Some(inner_err) = e {
                    write!(f, "JobError: {inner_err}")
                } else {
                    write!(f, "JobError: DaoFailure")
                }
            }
            JobError::ConcurrencyError(e) => {
                write!(f, "JobError: ConcurrencyError: {e}")
            }
            JobError::InvalidPayload(e) => {
                write!(f, "JobError: Invalid job payload: {e}")
            }
            JobError::UnknownJobType(job_type) => {
                write!(f, "JobError: No handler registered for job type \"{job_type}\"")
            }
        }
    }
}

impl From<DaoError> for JobError {
    fn from(e: DaoError) -> Self {
        JobError::DaoFailure(Some(e))
    }
}

impl From<JoinError> for JobError {
    fn from(e: JoinError) -> Self {
        JobError::ConcurrencyError(e)
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::InvalidPayload(e)
    }
}

/// A unit of work the runner fires on its daily schedule.
#[async_trait]
pub trait Job: Send {
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
    async fn execute(&mut self) -> Result<(), JobError>;
}

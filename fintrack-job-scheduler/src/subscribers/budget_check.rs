use fintrack_common::db::job_queue::{JobQueue, RetryPolicy};
use fintrack_common::db::DaoError;
use fintrack_common::events::{Event, EventHandler};
use fintrack_common::messages::CheckBudgetLimitJob;
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use std::sync::Arc;

/// Bridges `expense.created` into the durable queue: every committed
/// expense, recurring-derived or manual, gets exactly one budget check
/// enqueued for it.
pub struct EnqueueBudgetCheck {
    job_queue: Arc<dyn JobQueue>,
    retry_policy: RetryPolicy,
}

impl EnqueueBudgetCheck {
    pub fn new(job_queue: Arc<dyn JobQueue>, retry_policy: RetryPolicy) -> Self {
        Self {
            job_queue,
            retry_policy,
        }
    }
}

#[async_trait]
impl EventHandler for EnqueueBudgetCheck {
    fn name(&self) -> &'static str {
        "Enqueue Budget Check"
    }

    async fn handle(&self, event: &Event) -> Result<(), DaoError> {
        let Event::ExpenseCreated(expense) = event else {
            return Ok(());
        };

        let payload = match serde_json::to_value(CheckBudgetLimitJob {
            expense_id: expense.id,
        }) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize budget check payload: {}", e);
                return Ok(());
            }
        };

        let queue = Arc::clone(&self.job_queue);
        let retry_policy = self.retry_policy;
        let expense_id = expense.id;

        match tokio::task::spawn_blocking(move || {
            queue.enqueue(JobType::CheckBudgetLimit, payload, retry_policy)
        })
        .await
        {
            Ok(Ok(job_id)) => {
                log::info!(
                    "Enqueued budget check for expense {} as job {}",
                    expense_id,
                    job_id,
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => {
                log::error!("Failed to join Tokio task: {}", e);
                Ok(())
            }
        }
    }
}

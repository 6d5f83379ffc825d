use fintrack_common::db::budget::BudgetStore;
use fintrack_common::db::expense::ExpenseStore;
use fintrack_common::db::job_queue::{JobQueue, RetryPolicy};
use fintrack_common::messages::{CheckBudgetLimitJob, ProcessSingleBudgetJob};
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use futures::future;
use std::sync::Arc;

use crate::jobs::JobError;
use crate::queue::QueuedJobHandler;

/// First stage of the budget-threshold check: resolves the triggering
/// expense, finds the active budgets for its category, and fans out one
/// independent `process-single-budget` unit per budget.
pub struct CheckBudgetLimitHandler {
    expense_store: Arc<dyn ExpenseStore>,
    budget_store: Arc<dyn BudgetStore>,
    job_queue: Arc<dyn JobQueue>,
    retry_policy: RetryPolicy,
}

impl CheckBudgetLimitHandler {
    pub fn new(
        expense_store: Arc<dyn ExpenseStore>,
        budget_store: Arc<dyn BudgetStore>,
        job_queue: Arc<dyn JobQueue>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            expense_store,
            budget_store,
            job_queue,
            retry_policy,
        }
    }
}

#[async_trait]
impl QueuedJobHandler for CheckBudgetLimitHandler {
    fn job_type(&self) -> JobType {
        JobType::CheckBudgetLimit
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<(), JobError> {
        let CheckBudgetLimitJob { expense_id } = serde_json::from_value(payload)?;

        let expense_store = Arc::clone(&self.expense_store);
        let expense =
            tokio::task::spawn_blocking(move || expense_store.get_expense(expense_id))
                .await??;

        // An expense deleted between enqueue and execution means there is
        // nothing to check, not an error.
        let Some(expense) = expense else {
            log::warn!(
                "Expense {} was gone before its budget check ran; nothing to check",
                expense_id,
            );
            return Ok(());
        };

        let budget_store = Arc::clone(&self.budget_store);
        let category_id = expense.category_id;
        let budgets =
            tokio::task::spawn_blocking(move || budget_store.find_active_by_category(category_id))
                .await??;

        let mut enqueue_futures = Vec::with_capacity(budgets.len());

        for budget in budgets {
            let queue = Arc::clone(&self.job_queue);
            let retry_policy = self.retry_policy;
            let expense = expense.clone();
            let budget_id = budget.id;

            enqueue_futures.push(tokio::task::spawn_blocking(move || {
                let payload = serde_json::to_value(ProcessSingleBudgetJob { budget, expense })?;
                queue.enqueue(JobType::ProcessSingleBudget, payload, retry_policy)?;
                Ok::<_, JobError>(budget_id)
            }));
        }

        let results = future::join_all(enqueue_futures).await;

        for result in results.into_iter() {
            if let Err(e) = result? {
                log::error!("Failed to enqueue budget check unit: {e}");
            }
        }

        Ok(())
    }
}

use fintrack_common::db::job_queue::{JobQueue, RetryPolicy};
use fintrack_common::db::recurring_transaction::RecurringTransactionStore;
use fintrack_common::messages::ProcessRecurringJob;
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use chrono::Utc;
use futures::future;
use std::sync::Arc;

use crate::jobs::{Job, JobError};

/// The daily scan: fetches the due set and fans out one queued
/// `process-single-recurring` unit per due transaction. Payloads carry only
/// the id so each unit re-reads its record at execution time.
pub struct DispatchDueRecurringJob {
    recurring_transaction_store: Arc<dyn RecurringTransactionStore>,
    job_queue: Arc<dyn JobQueue>,
    retry_policy: RetryPolicy,
    is_running: bool,
}

impl DispatchDueRecurringJob {
    pub fn new(
        recurring_transaction_store: Arc<dyn RecurringTransactionStore>,
        job_queue: Arc<dyn JobQueue>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            recurring_transaction_store,
            job_queue,
            retry_policy,
            is_running: false,
        }
    }

    async fn dispatch(&self) -> Result<(), JobError> {
        let store = Arc::clone(&self.recurring_transaction_store);
        let now = Utc::now().naive_utc();

        let due_transactions =
            tokio::task::spawn_blocking(move || store.find_due(now)).await??;

        log::info!(
            "Found {} due recurring transactions",
            due_transactions.len()
        );

        let mut enqueue_futures = Vec::with_capacity(due_transactions.len());

        for transaction in due_transactions {
            let queue = Arc::clone(&self.job_queue);
            let retry_policy = self.retry_policy;
            let recurring_id = transaction.id;

            enqueue_futures.push(tokio::task::spawn_blocking(move || {
                let payload = serde_json::to_value(ProcessRecurringJob { recurring_id })?;
                queue.enqueue(JobType::ProcessRecurring, payload, retry_policy)?;
                Ok::<_, JobError>(recurring_id)
            }));
        }

        let results = future::join_all(enqueue_futures).await;

        // A failed enqueue is logged for manual replay; it must not hold up
        // the rest of the batch.
        for result in results.into_iter() {
            if let Err(e) = result? {
                log::error!("Failed to enqueue recurring transaction for processing: {e}");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Job for DispatchDueRecurringJob {
    fn name(&self) -> &'static str {
        "Dispatch Due Recurring Transactions"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.is_running = true;
        let result = self.dispatch().await;
        self.is_running = false;
        result
    }
}

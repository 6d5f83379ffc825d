mod check_budget_limit;
mod process_recurring;
mod process_single_budget;

pub use check_budget_limit::CheckBudgetLimitHandler;
pub use process_recurring::ProcessRecurringHandler;
pub use process_single_budget::ProcessSingleBudgetHandler;

#[cfg(test)]
pub mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDateTime, Utc};
    use uuid::Uuid;

    use fintrack_common::db::budget::BudgetStore;
    use fintrack_common::db::expense::ExpenseStore;
    use fintrack_common::db::job_queue::{JobQueue, RetryPolicy};
    use fintrack_common::db::DaoError;
    use fintrack_common::events::{Event, EventHandler};
    use fintrack_common::models::budget::Budget;
    use fintrack_common::models::expense::Expense;
    use fintrack_common::models::queued_job::JobType;
    use fintrack_common::types::TransactionKind;

    pub fn test_expense(category_id: Uuid, amount_cents: i64) -> Expense {
        let now = Utc::now().naive_utc();
        Expense {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            title: String::from("Groceries"),
            amount_cents,
            transaction_kind: TransactionKind::Expense,
            category_id,
            wallet_id: Uuid::now_v7(),
            description: None,
            expense_date: now,
            recurring_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn test_budget(category_id: Uuid, amount_cents: i64) -> Budget {
        let now = Utc::now().naive_utc();
        Budget {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            category_id,
            amount_cents,
            start_date: now - chrono::Duration::days(30),
            end_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub struct RecordingEventHandler {
        pub events: Mutex<Vec<Event>>,
    }

    impl RecordingEventHandler {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EventHandler for RecordingEventHandler {
        fn name(&self) -> &'static str {
            "Recording"
        }

        async fn handle(&self, event: &Event) -> Result<(), DaoError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    pub struct CapturingQueue {
        pub enqueued: Mutex<Vec<(JobType, serde_json::Value)>>,
    }

    impl CapturingQueue {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                enqueued: Mutex::new(Vec::new()),
            })
        }
    }

    impl JobQueue for CapturingQueue {
        fn enqueue(
            &self,
            job_type: JobType,
            payload: serde_json::Value,
            _policy: RetryPolicy,
        ) -> Result<Uuid, DaoError> {
            self.enqueued.lock().unwrap().push((job_type, payload));
            Ok(Uuid::now_v7())
        }
    }

    pub struct StubExpenseStore {
        pub expense: Option<Expense>,
        pub total_cents: i64,
    }

    impl ExpenseStore for StubExpenseStore {
        fn get_expense(&self, _expense_id: Uuid) -> Result<Option<Expense>, DaoError> {
            Ok(self.expense.clone())
        }

        fn total_spent_in_category(
            &self,
            _category_id: Uuid,
            _from: NaiveDateTime,
            _to: Option<NaiveDateTime>,
        ) -> Result<i64, DaoError> {
            Ok(self.total_cents)
        }
    }

    pub struct StubBudgetStore {
        pub budgets: Vec<Budget>,
    }

    impl BudgetStore for StubBudgetStore {
        fn find_active_by_category(
            &self,
            _category_id: Uuid,
        ) -> Result<Vec<Budget>, DaoError> {
            Ok(self.budgets.clone())
        }
    }
}

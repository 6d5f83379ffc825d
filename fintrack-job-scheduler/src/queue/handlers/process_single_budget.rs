use fintrack_common::db::expense::ExpenseStore;
use fintrack_common::events::{Event, EventBus};
use fintrack_common::messages::ProcessSingleBudgetJob;
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use std::sync::Arc;

use crate::jobs::JobError;
use crate::queue::QueuedJobHandler;

/// Second stage of the budget-threshold check: recomputes cumulative spend
/// over the budget window and announces when the limit is met or exceeded.
/// Pure read-then-notify; re-running it recomputes the same total, so a
/// retried attempt can only re-notify, never corrupt state.
pub struct ProcessSingleBudgetHandler {
    expense_store: Arc<dyn ExpenseStore>,
    event_bus: Arc<EventBus>,
}

impl ProcessSingleBudgetHandler {
    pub fn new(expense_store: Arc<dyn ExpenseStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            expense_store,
            event_bus,
        }
    }
}

#[async_trait]
impl QueuedJobHandler for ProcessSingleBudgetHandler {
    fn job_type(&self) -> JobType {
        JobType::ProcessSingleBudget
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<(), JobError> {
        let ProcessSingleBudgetJob { budget, expense } = serde_json::from_value(payload)?;

        let expense_store = Arc::clone(&self.expense_store);
        let category_id = budget.category_id;
        let from = budget.start_date;
        let to = budget.end_date;

        let total_cents = tokio::task::spawn_blocking(move || {
            expense_store.total_spent_in_category(category_id, from, to)
        })
        .await??;

        if total_cents >= budget.amount_cents {
            log::info!(
                "Budget {} limit reached: {} of {} cents spent in category {}",
                budget.id,
                total_cents,
                budget.amount_cents,
                budget.category_id,
            );

            self.event_bus
                .publish(Event::BudgetLimitExceeded {
                    budget,
                    expense,
                    total_cents,
                })
                .await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use uuid::Uuid;

    use fintrack_common::events::EventKind;
    use fintrack_common::models::budget::Budget;

    use crate::queue::handlers::test_support::{
        test_budget, test_expense, RecordingEventHandler, StubExpenseStore,
    };

    fn run_check(
        budget: Budget,
        total_cents: i64,
    ) -> (
        ProcessSingleBudgetHandler,
        Arc<RecordingEventHandler>,
        serde_json::Value,
    ) {
        let recording = RecordingEventHandler::new();

        let mut bus = EventBus::new();
        bus.register(EventKind::BudgetLimitExceeded, Arc::clone(&recording) as _);

        let handler = ProcessSingleBudgetHandler::new(
            Arc::new(StubExpenseStore {
                expense: None,
                total_cents,
            }),
            Arc::new(bus),
        );

        let payload = serde_json::to_value(ProcessSingleBudgetJob {
            expense: test_expense(budget.category_id, 15_000),
            budget,
        })
        .unwrap();

        (handler, recording, payload)
    }

    #[tokio::test]
    async fn test_spend_at_exactly_the_limit_raises_one_event() {
        let budget = test_budget(Uuid::now_v7(), 100_000);
        let (handler, recording, payload) = run_check(budget.clone(), 100_000);

        handler.handle(payload).await.unwrap();

        let events = recording.events.lock().unwrap();
        assert_eq!(events.len(), 1);

        let Event::BudgetLimitExceeded {
            budget: announced,
            total_cents,
            ..
        } = &events[0]
        else {
            panic!("expected a budget.limit.exceeded event");
        };
        assert_eq!(announced.id, budget.id);
        assert_eq!(*total_cents, 100_000);
    }

    #[tokio::test]
    async fn test_spend_one_below_the_limit_raises_nothing() {
        let budget = test_budget(Uuid::now_v7(), 100_000);
        let (handler, recording, payload) = run_check(budget, 99_999);

        handler.handle(payload).await.unwrap();

        assert!(recording.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overspend_reports_the_recomputed_total() {
        // Prior spend of 40_000 plus a new 15_000 expense against a 50_000
        // budget.
        let budget = test_budget(Uuid::now_v7(), 50_000);
        let (handler, recording, payload) = run_check(budget, 55_000);

        handler.handle(payload).await.unwrap();

        let events = recording.events.lock().unwrap();
        assert_eq!(events.len(), 1);

        let Event::BudgetLimitExceeded { total_cents, .. } = &events[0] else {
            panic!("expected a budget.limit.exceeded event");
        };
        assert_eq!(*total_cents, 55_000);
    }
}

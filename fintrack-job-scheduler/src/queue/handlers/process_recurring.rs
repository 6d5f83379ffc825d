use fintrack_common::db::recurring_transaction::RecurringTransactionStore;
use fintrack_common::events::{Event, EventBus};
use fintrack_common::messages::ProcessRecurringJob;
use fintrack_common::models::queued_job::JobType;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::jobs::JobError;
use crate::queue::QueuedJobHandler;

/// Runs one recurrence-processing unit of work. The store call is the
/// atomic pass (expense + log + advance commit together); events go out
/// only after it returns, so budget checks never observe uncommitted state.
pub struct ProcessRecurringHandler {
    recurring_transaction_store: Arc<dyn RecurringTransactionStore>,
    event_bus: Arc<EventBus>,
}

impl ProcessRecurringHandler {
    pub fn new(
        recurring_transaction_store: Arc<dyn RecurringTransactionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            recurring_transaction_store,
            event_bus,
        }
    }
}

#[async_trait]
impl QueuedJobHandler for ProcessRecurringHandler {
    fn job_type(&self) -> JobType {
        JobType::ProcessRecurring
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<(), JobError> {
        let ProcessRecurringJob { recurring_id } = serde_json::from_value(payload)?;

        let store = Arc::clone(&self.recurring_transaction_store);
        let now = Utc::now().naive_utc();

        let expense =
            tokio::task::spawn_blocking(move || store.process_recurring(recurring_id, now))
                .await??;

        match expense {
            Some(expense) => {
                log::info!(
                    "Materialized expense {} from recurring transaction {}",
                    expense.id,
                    recurring_id,
                );

                // The single emission site for recurrence-derived expenses.
                self.event_bus
                    .publish(Event::ExpenseCreated(expense.clone()))
                    .await;
                self.event_bus
                    .publish(Event::RecurringExpenseExecuted(expense))
                    .await;
            }
            None => {
                log::info!(
                    "Recurring transaction {} is inactive or has auto-create disabled; \
                     no expense materialized",
                    recurring_id,
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDateTime;
    use uuid::Uuid;

    use fintrack_common::db::DaoError;
    use fintrack_common::events::EventKind;
    use fintrack_common::models::expense::Expense;
    use fintrack_common::models::recurring_transaction::RecurringTransaction;

    use crate::queue::handlers::test_support::{test_expense, RecordingEventHandler};

    struct StubRecurringStore {
        result: Result<Option<Expense>, DaoError>,
    }

    impl RecurringTransactionStore for StubRecurringStore {
        fn find_due(
            &self,
            _as_of: NaiveDateTime,
        ) -> Result<Vec<RecurringTransaction>, DaoError> {
            unreachable!("the processing handler never scans for due records")
        }

        fn process_recurring(
            &self,
            _recurring_id: Uuid,
            _now: NaiveDateTime,
        ) -> Result<Option<Expense>, DaoError> {
            match &self.result {
                Ok(expense) => Ok(expense.clone()),
                Err(DaoError::NotFound(entity)) => Err(DaoError::NotFound(entity)),
                Err(_) => Err(DaoError::NotFound("recurring transaction")),
            }
        }
    }

    fn handler_with(
        result: Result<Option<Expense>, DaoError>,
    ) -> (ProcessRecurringHandler, Arc<RecordingEventHandler>) {
        let recording = RecordingEventHandler::new();

        let mut bus = EventBus::new();
        bus.register(EventKind::ExpenseCreated, Arc::clone(&recording) as _);
        bus.register(
            EventKind::RecurringExpenseExecuted,
            Arc::clone(&recording) as _,
        );

        let handler = ProcessRecurringHandler::new(
            Arc::new(StubRecurringStore { result }),
            Arc::new(bus),
        );

        (handler, recording)
    }

    fn payload() -> serde_json::Value {
        serde_json::to_value(ProcessRecurringJob {
            recurring_id: Uuid::now_v7(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_materialized_expense_is_announced_exactly_once() {
        let expense = test_expense(Uuid::now_v7(), 120_000);
        let (handler, recording) = handler_with(Ok(Some(expense.clone())));

        handler.handle(payload()).await.unwrap();

        let events = recording.events.lock().unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::ExpenseCreated, EventKind::RecurringExpenseExecuted],
        );

        let Event::ExpenseCreated(announced) = &events[0] else {
            panic!("expected an expense.created event");
        };
        assert_eq!(announced.id, expense.id);
    }

    #[tokio::test]
    async fn test_no_events_without_a_materialized_expense() {
        let (handler, recording) = handler_with(Ok(None));

        handler.handle(payload()).await.unwrap();

        assert!(recording.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_fails_the_unit_of_work() {
        let (handler, recording) =
            handler_with(Err(DaoError::NotFound("recurring transaction")));

        assert!(handler.handle(payload()).await.is_err());
        assert!(recording.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbled_payload_is_rejected() {
        let (handler, _) = handler_with(Ok(None));

        let result = handler
            .handle(serde_json::json!({ "recurring": "not-a-uuid" }))
            .await;

        assert!(matches!(result, Err(JobError::InvalidPayload(_))));
    }
}

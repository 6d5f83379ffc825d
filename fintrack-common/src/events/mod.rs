use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::DaoError;
use crate::models::budget::Budget;
use crate::models::expense::Expense;

/// Domain events this core produces. The names are the routing keys the
/// downstream gateway consumes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EventKind {
    ExpenseCreated,
    RecurringExpenseExecuted,
    BudgetLimitExceeded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ExpenseCreated => "expense.created",
            EventKind::RecurringExpenseExecuted => "recurring.expense.executed",
            EventKind::BudgetLimitExceeded => "budget.limit.exceeded",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    ExpenseCreated(Expense),
    RecurringExpenseExecuted(Expense),
    BudgetLimitExceeded {
        budget: Budget,
        expense: Expense,
        total_cents: i64,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ExpenseCreated(_) => EventKind::ExpenseCreated,
            Event::RecurringExpenseExecuted(_) => EventKind::RecurringExpenseExecuted,
            Event::BudgetLimitExceeded { .. } => EventKind::BudgetLimitExceeded,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, event: &Event) -> Result<(), DaoError>;
}

/// In-process event bus. Handlers are registered per event kind at startup;
/// a failing handler is logged and never affects its siblings or the
/// publisher.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        log::info!(
            "Registered handler \"{}\" for event \"{}\"",
            handler.name(),
            kind.as_str(),
        );

        self.handlers.entry(kind).or_default().push(handler);
    }

    pub async fn publish(&self, event: Event) {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            return;
        };

        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                log::error!(
                    "Handler \"{}\" failed for event \"{}\": {}",
                    handler.name(),
                    event.kind().as_str(),
                    e,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::types::TransactionKind;

    pub fn test_expense() -> Expense {
        let now = Utc::now().naive_utc();
        Expense {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            title: String::from("Test expense"),
            amount_cents: 15_000,
            transaction_kind: TransactionKind::Expense,
            category_id: Uuid::now_v7(),
            wallet_id: Uuid::now_v7(),
            description: None,
            expense_date: now,
            recurring_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct RecordingHandler {
        seen: Mutex<Vec<EventKind>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            "Recording"
        }

        async fn handle(&self, event: &Event) -> Result<(), DaoError> {
            self.seen.lock().unwrap().push(event.kind());
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        fn name(&self) -> &'static str {
            "Failing"
        }

        async fn handle(&self, _event: &Event) -> Result<(), DaoError> {
            Err(DaoError::NotFound("anything"))
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_only_matching_handlers() {
        let mut bus = EventBus::new();
        let expense_handler = RecordingHandler::new();
        let budget_handler = RecordingHandler::new();

        bus.register(EventKind::ExpenseCreated, Arc::clone(&expense_handler) as _);
        bus.register(
            EventKind::BudgetLimitExceeded,
            Arc::clone(&budget_handler) as _,
        );

        bus.publish(Event::ExpenseCreated(test_expense())).await;
        bus.publish(Event::RecurringExpenseExecuted(test_expense())).await;

        assert_eq!(
            *expense_handler.seen.lock().unwrap(),
            vec![EventKind::ExpenseCreated],
        );
        assert!(budget_handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_affect_siblings() {
        let mut bus = EventBus::new();
        let recording = RecordingHandler::new();

        bus.register(EventKind::ExpenseCreated, Arc::new(FailingHandler));
        bus.register(EventKind::ExpenseCreated, Arc::clone(&recording) as _);

        bus.publish(Event::ExpenseCreated(test_expense())).await;

        assert_eq!(recording.seen.lock().unwrap().len(), 1);
    }
}

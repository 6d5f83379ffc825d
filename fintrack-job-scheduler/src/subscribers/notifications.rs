use fintrack_common::db::DaoError;
use fintrack_common::events::{Event, EventHandler};

use async_trait::async_trait;

/// Terminal seam to the notification gateway. Delivery transport lives
/// outside this process; this relay writes the routed message to the log
/// so every emission is observable and replayable.
pub struct NotificationRelay;

#[async_trait]
impl EventHandler for NotificationRelay {
    fn name(&self) -> &'static str {
        "Notification Relay"
    }

    async fn handle(&self, event: &Event) -> Result<(), DaoError> {
        match event {
            Event::ExpenseCreated(expense) => {
                log::info!(
                    "Notify user {}: expense \"{}\" of {} cents recorded",
                    expense.user_id,
                    expense.title,
                    expense.amount_cents,
                );
            }
            Event::RecurringExpenseExecuted(expense) => {
                log::info!(
                    "Notify user {}: recurring transaction {} executed as expense {}",
                    expense.user_id,
                    expense
                        .recurring_transaction_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| String::from("<unknown>")),
                    expense.id,
                );
            }
            Event::BudgetLimitExceeded {
                budget,
                expense,
                total_cents,
            } => {
                log::info!(
                    "Notify user {}: budget {} limit reached ({} of {} cents spent; \
                     triggered by expense {})",
                    budget.user_id,
                    budget.id,
                    total_cents,
                    budget.amount_cents,
                    expense.id,
                );
            }
        }

        Ok(())
    }
}

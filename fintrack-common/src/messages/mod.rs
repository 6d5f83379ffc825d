use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::models::expense::Expense;
use crate::types::{Frequency, TransactionKind};

/// Owner-supplied fields for a new recurring transaction. `is_active`,
/// `auto_create`, and `reminder_days_before` default to true/true/1 when
/// omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateRecurringTransaction {
    pub title: String,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub auto_create: Option<bool>,
    pub reminder_days_before: Option<i32>,
}

/// Partial edit of a recurring transaction. A `None` field is left
/// untouched; `end_date: Some(None)` clears the end date.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateRecurringTransaction {
    pub title: Option<String>,
    pub amount_cents: Option<i64>,
    pub transaction_kind: Option<TransactionKind>,
    pub category_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub frequency: Option<Frequency>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<Option<NaiveDateTime>>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub auto_create: Option<bool>,
    pub reminder_days_before: Option<i32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateExpense {
    pub title: String,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub description: Option<String>,
    pub expense_date: NaiveDateTime,
    pub recurring_transaction_id: Option<Uuid>,
}

/// Payload of a `process-single-recurring` queued job. Carries only the id
/// so the record is re-read at execution time, never a stale snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessRecurringJob {
    pub recurring_id: Uuid,
}

/// Payload of a `check-budget-limit` queued job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckBudgetLimitJob {
    pub expense_id: Uuid,
}

/// Payload of a `process-single-budget` queued job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessSingleBudgetJob {
    pub budget: Budget,
    pub expense: Expense,
}

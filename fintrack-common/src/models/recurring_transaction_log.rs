use chrono::NaiveDateTime;
use diesel::{Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::recurring_transaction_logs;
use crate::types::LogStatus;

/// Audit record of one processing pass. `scheduled_date` is the
/// `next_occurrence` the pass was fired for; `executed_date` is when the
/// pass actually ran.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = recurring_transaction_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecurringTransactionLog {
    pub id: Uuid,
    pub recurring_transaction_id: Uuid,
    pub scheduled_date: NaiveDateTime,
    pub executed_date: NaiveDateTime,
    pub expense_id: Option<Uuid>,
    pub status: LogStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recurring_transaction_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewRecurringTransactionLog<'a> {
    pub id: Uuid,
    pub recurring_transaction_id: Uuid,
    pub scheduled_date: NaiveDateTime,
    pub executed_date: NaiveDateTime,
    pub expense_id: Option<Uuid>,
    pub status: LogStatus,
    pub notes: Option<&'a str>,
}

use chrono::NaiveDateTime;
use diesel::{AsChangeset, Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::recurring_transactions;
use crate::types::{Frequency, TransactionKind};

/// A template that periodically materializes an expense/income record.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = recurring_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecurringTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub next_occurrence: NaiveDateTime,
    pub last_occurrence: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub is_active: bool,
    pub auto_create: bool,
    pub reminder_days_before: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recurring_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewRecurringTransaction<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: &'a str,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub frequency: Frequency,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub next_occurrence: NaiveDateTime,
    pub last_occurrence: Option<NaiveDateTime>,
    pub description: Option<&'a str>,
    pub is_active: bool,
    pub auto_create: bool,
    pub reminder_days_before: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Owner-initiated edits. `None` leaves a column untouched; `end_date`
/// distinguishes "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = recurring_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecurringTransactionChanges<'a> {
    pub title: Option<&'a str>,
    pub amount_cents: Option<i64>,
    pub transaction_kind: Option<TransactionKind>,
    pub category_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub frequency: Option<Frequency>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<Option<NaiveDateTime>>,
    pub description: Option<&'a str>,
    pub is_active: Option<bool>,
    pub auto_create: Option<bool>,
    pub reminder_days_before: Option<i32>,
    pub next_occurrence: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

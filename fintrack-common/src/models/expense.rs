use chrono::NaiveDateTime;
use diesel::{Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::expenses;
use crate::types::TransactionKind;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = expenses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub description: Option<String>,
    pub expense_date: NaiveDateTime,
    pub recurring_transaction_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expenses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewExpense<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: &'a str,
    pub amount_cents: i64,
    pub transaction_kind: TransactionKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub description: Option<&'a str>,
    pub expense_date: NaiveDateTime,
    pub recurring_transaction_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

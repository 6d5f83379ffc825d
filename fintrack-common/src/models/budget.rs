use chrono::NaiveDateTime;
use diesel::{Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::budgets;

/// A spending limit over one category. A null `end_date` means the budget
/// is evaluated over all expenses from `start_date` onward.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = budgets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub amount_cents: i64,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = budgets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBudget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub amount_cents: i64,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

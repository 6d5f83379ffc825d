use chrono::{NaiveDateTime, Utc};
use diesel::dsl::sql;
use diesel::sql_types::BigInt;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::messages::CreateExpense;
use crate::models::expense::{Expense, NewExpense};
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;

/// What the budget-threshold check needs from the expense repository.
pub trait ExpenseStore: Send + Sync {
    fn get_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, DaoError>;

    /// Cumulative spend in a category between `from` and `to`, inclusive on
    /// both ends. A `None` upper bound means "from `from` onward, forever".
    fn total_spent_in_category(
        &self,
        category_id: Uuid,
        from: NaiveDateTime,
        to: Option<NaiveDateTime>,
    ) -> Result<i64, DaoError>;
}

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    /// Persists a new expense. The caller owns publishing the corresponding
    /// `expense.created` event once the row is committed.
    pub fn create_expense(
        &self,
        user_id: Uuid,
        fields: &CreateExpense,
    ) -> Result<Expense, DaoError> {
        let now = Utc::now().naive_utc();

        let new_expense = NewExpense {
            id: Uuid::now_v7(),
            user_id,
            title: &fields.title,
            amount_cents: fields.amount_cents,
            transaction_kind: fields.transaction_kind,
            category_id: fields.category_id,
            wallet_id: fields.wallet_id,
            description: fields.description.as_deref(),
            expense_date: fields.expense_date,
            recurring_transaction_id: fields.recurring_transaction_id,
            created_at: now,
            updated_at: now,
        };

        Ok(dsl::insert_into(expenses)
            .values(&new_expense)
            .get_result::<Expense>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn get_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, DaoError> {
        Ok(expenses
            .find(expense_id)
            .get_result::<Expense>(&mut self.db_thread_pool.get()?)
            .optional()?)
    }

    pub fn total_spent_in_category(
        &self,
        category_id: Uuid,
        from: NaiveDateTime,
        to: Option<NaiveDateTime>,
    ) -> Result<i64, DaoError> {
        let mut query = expenses
            .filter(expense_fields::category_id.eq(category_id))
            .filter(expense_fields::expense_date.ge(from))
            .select(sql::<BigInt>("COALESCE(SUM(amount_cents), 0)"))
            .into_boxed();

        if let Some(to) = to {
            query = query.filter(expense_fields::expense_date.le(to));
        }

        Ok(query.get_result::<i64>(&mut self.db_thread_pool.get()?)?)
    }
}

impl ExpenseStore for Dao {
    fn get_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, DaoError> {
        Dao::get_expense(self, expense_id)
    }

    fn total_spent_in_category(
        &self,
        category_id: Uuid,
        from: NaiveDateTime,
        to: Option<NaiveDateTime>,
    ) -> Result<i64, DaoError> {
        Dao::total_spent_in_category(self, category_id, from, to)
    }
}

use chrono::{NaiveDateTime, Utc};
use diesel::{
    dsl, BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    RunQueryDsl,
};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::messages::{CreateRecurringTransaction, UpdateRecurringTransaction};
use crate::models::expense::{Expense, NewExpense};
use crate::models::recurring_transaction::{
    NewRecurringTransaction, RecurringTransaction, RecurringTransactionChanges,
};
use crate::models::recurring_transaction_log::NewRecurringTransactionLog;
use crate::occurrence;
use crate::schema::expenses::dsl::expenses;
use crate::schema::recurring_transaction_logs::dsl::recurring_transaction_logs;
use crate::schema::recurring_transactions as recurring_transaction_fields;
use crate::schema::recurring_transactions::dsl::recurring_transactions;
use crate::types::LogStatus;

/// The operations background processing needs from the recurring-transaction
/// repository. The concrete `Dao` implements this against Postgres; tests
/// substitute in-memory stands-ins.
pub trait RecurringTransactionStore: Send + Sync {
    fn find_due(&self, as_of: NaiveDateTime) -> Result<Vec<RecurringTransaction>, DaoError>;

    /// Applies one processing pass to the identified recurring transaction.
    /// Returns the materialized expense, or `None` when the record is
    /// inactive or has `auto_create` unset.
    fn process_recurring(
        &self,
        recurring_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<Option<Expense>, DaoError>;
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

    pub fn create(
        &self,
        user_id: Uuid,
        fields: &CreateRecurringTransaction,
    ) -> Result<RecurringTransaction, DaoError> {
        let now = Utc::now().naive_utc();
        let next_occurrence = occurrence::next_occurrence(fields.start_date, fields.frequency);

        let new_transaction = NewRecurringTransaction {
            id: Uuid::now_v7(),
            user_id,
            title: &fields.title,
            amount_cents: fields.amount_cents,
            transaction_kind: fields.transaction_kind,
            category_id: fields.category_id,
            wallet_id: fields.wallet_id,
            frequency: fields.frequency,
            start_date: fields.start_date,
            end_date: fields.end_date,
            next_occurrence,
            last_occurrence: None,
            description: fields.description.as_deref(),
            is_active: fields.is_active.unwrap_or(true),
            auto_create: fields.auto_create.unwrap_or(true),
            reminder_days_before: fields.reminder_days_before.unwrap_or(1),
            created_at: now,
            updated_at: now,
        };

        Ok(dsl::insert_into(recurring_transactions)
            .values(&new_transaction)
            .get_result::<RecurringTransaction>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn get(
        &self,
        recurring_id: Uuid,
        user_id: Uuid,
    ) -> Result<RecurringTransaction, DaoError> {
        let transaction = recurring_transactions
            .find(recurring_id)
            .get_result::<RecurringTransaction>(&mut self.db_thread_pool.get()?)
            .optional()?
            .ok_or(DaoError::NotFound("recurring transaction"))?;

        if transaction.user_id != user_id {
            return Err(DaoError::PermissionDenied("recurring transaction"));
        }

        Ok(transaction)
    }

    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<RecurringTransaction>, DaoError> {
        Ok(recurring_transactions
            .filter(recurring_transaction_fields::user_id.eq(user_id))
            .order(recurring_transaction_fields::next_occurrence.asc())
            .get_results::<RecurringTransaction>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn list_active_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RecurringTransaction>, DaoError> {
        Ok(recurring_transactions
            .filter(recurring_transaction_fields::user_id.eq(user_id))
            .filter(recurring_transaction_fields::is_active.eq(true))
            .order(recurring_transaction_fields::next_occurrence.asc())
            .get_results::<RecurringTransaction>(&mut self.db_thread_pool.get()?)?)
    }

    /// Applies an owner edit. When the frequency or start date changes, the
    /// next occurrence is recomputed from the new pair.
    pub fn update(
        &self,
        recurring_id: Uuid,
        user_id: Uuid,
        edits: &UpdateRecurringTransaction,
    ) -> Result<RecurringTransaction, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let existing = recurring_transactions
                    .find(recurring_id)
                    .get_result::<RecurringTransaction>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("recurring transaction"))?;

                if existing.user_id != user_id {
                    return Err(DaoError::PermissionDenied("recurring transaction"));
                }

                let next_occurrence =
                    if edits.frequency.is_some() || edits.start_date.is_some() {
                        let start_date = edits.start_date.unwrap_or(existing.start_date);
                        let frequency = edits.frequency.unwrap_or(existing.frequency);
                        Some(occurrence::next_occurrence(start_date, frequency))
                    } else {
                        None
                    };

                let changes = RecurringTransactionChanges {
                    title: edits.title.as_deref(),
                    amount_cents: edits.amount_cents,
                    transaction_kind: edits.transaction_kind,
                    category_id: edits.category_id,
                    wallet_id: edits.wallet_id,
                    frequency: edits.frequency,
                    start_date: edits.start_date,
                    end_date: edits.end_date,
                    description: edits.description.as_deref(),
                    is_active: edits.is_active,
                    auto_create: edits.auto_create,
                    reminder_days_before: edits.reminder_days_before,
                    next_occurrence,
                    updated_at: Some(Utc::now().naive_utc()),
                };

                Ok(diesel::update(recurring_transactions.find(recurring_id))
                    .set(&changes)
                    .get_result::<RecurringTransaction>(conn)?)
            })
    }

    /// Flips the active flag. An inactive record is frozen: the scheduler
    /// skips it and the processor refuses to touch it.
    pub fn toggle_active(
        &self,
        recurring_id: Uuid,
        user_id: Uuid,
    ) -> Result<RecurringTransaction, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let existing = recurring_transactions
                    .find(recurring_id)
                    .get_result::<RecurringTransaction>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("recurring transaction"))?;

                if existing.user_id != user_id {
                    return Err(DaoError::PermissionDenied("recurring transaction"));
                }

                Ok(diesel::update(recurring_transactions.find(recurring_id))
                    .set((
                        recurring_transaction_fields::is_active.eq(!existing.is_active),
                        recurring_transaction_fields::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .get_result::<RecurringTransaction>(conn)?)
            })
    }

    pub fn delete(&self, recurring_id: Uuid, user_id: Uuid) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let owner = recurring_transactions
                    .find(recurring_id)
                    .select(recurring_transaction_fields::user_id)
                    .get_result::<Uuid>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("recurring transaction"))?;

                if owner != user_id {
                    return Err(DaoError::PermissionDenied("recurring transaction"));
                }

                diesel::delete(recurring_transactions.find(recurring_id)).execute(conn)?;

                Ok(())
            })
    }

    /// Returns the full due set as of `as_of`: active records whose next
    /// occurrence has arrived and whose end date (if any) has not passed.
    pub fn find_due(&self, as_of: NaiveDateTime) -> Result<Vec<RecurringTransaction>, DaoError> {
        Ok(recurring_transactions
            .filter(recurring_transaction_fields::is_active.eq(true))
            .filter(recurring_transaction_fields::next_occurrence.le(as_of))
            .filter(
                recurring_transaction_fields::end_date
                    .is_null()
                    .or(recurring_transaction_fields::end_date.ge(as_of)),
            )
            .get_results::<RecurringTransaction>(&mut self.db_thread_pool.get()?)?)
    }

    /// Atomically records that a pass ran: `last_occurrence` takes the
    /// occurrence just handled and `next_occurrence` the newly computed one.
    pub fn advance(
        &self,
        recurring_id: Uuid,
        last_occurrence_time: NaiveDateTime,
        next_occurrence_time: NaiveDateTime,
    ) -> Result<(), DaoError> {
        let mut conn = self.db_thread_pool.get()?;
        advance_with_conn(
            &mut conn,
            recurring_id,
            last_occurrence_time,
            next_occurrence_time,
        )
    }

    /// One processing pass, commit-or-rollback as a whole: materialize the
    /// expense (when `auto_create` is set), write the audit log row with the
    /// pre-advance `next_occurrence`, then advance the schedule.
    pub fn process_recurring(
        &self,
        recurring_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<Option<Expense>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let transaction = recurring_transactions
                    .find(recurring_id)
                    .get_result::<RecurringTransaction>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("recurring transaction"))?;

                if !transaction.is_active {
                    return Ok(None);
                }

                let scheduled_date = transaction.next_occurrence;

                let expense = if transaction.auto_create {
                    let new_expense = NewExpense {
                        id: Uuid::now_v7(),
                        user_id: transaction.user_id,
                        title: &transaction.title,
                        amount_cents: transaction.amount_cents,
                        transaction_kind: transaction.transaction_kind,
                        category_id: transaction.category_id,
                        wallet_id: transaction.wallet_id,
                        description: transaction.description.as_deref(),
                        expense_date: now,
                        recurring_transaction_id: Some(transaction.id),
                        created_at: now,
                        updated_at: now,
                    };

                    Some(
                        dsl::insert_into(expenses)
                            .values(&new_expense)
                            .get_result::<Expense>(conn)?,
                    )
                } else {
                    None
                };

                let log_entry = NewRecurringTransactionLog {
                    id: Uuid::now_v7(),
                    recurring_transaction_id: transaction.id,
                    scheduled_date,
                    executed_date: now,
                    expense_id: expense.as_ref().map(|e| e.id),
                    status: if expense.is_some() {
                        LogStatus::Completed
                    } else {
                        LogStatus::Skipped
                    },
                    notes: None,
                };

                dsl::insert_into(recurring_transaction_logs)
                    .values(&log_entry)
                    .execute(conn)?;

                let new_next_occurrence =
                    occurrence::next_occurrence(scheduled_date, transaction.frequency);
                advance_with_conn(conn, transaction.id, scheduled_date, new_next_occurrence)?;

                Ok(expense)
            })
    }
}

fn advance_with_conn(
    conn: &mut PgConnection,
    recurring_id: Uuid,
    last_occurrence_time: NaiveDateTime,
    next_occurrence_time: NaiveDateTime,
) -> Result<(), DaoError> {
    let affected_rows = diesel::update(recurring_transactions.find(recurring_id))
        .set((
            recurring_transaction_fields::last_occurrence.eq(Some(last_occurrence_time)),
            recurring_transaction_fields::next_occurrence.eq(next_occurrence_time),
            recurring_transaction_fields::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    if affected_rows == 0 {
        return Err(DaoError::NotFound("recurring transaction"));
    }

    Ok(())
}

impl RecurringTransactionStore for Dao {
    fn find_due(&self, as_of: NaiveDateTime) -> Result<Vec<RecurringTransaction>, DaoError> {
        Dao::find_due(self, as_of)
    }

    fn process_recurring(
        &self,
        recurring_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<Option<Expense>, DaoError> {
        Dao::process_recurring(self, recurring_id, now)
    }
}

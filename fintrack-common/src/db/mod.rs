use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use std::fmt;
use std::time::Duration;

pub mod budget;
pub mod expense;
pub mod job_queue;
pub mod job_registry;
pub mod recurring_transaction;
pub mod recurring_transaction_log;

pub type DbThreadPool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_db_thread_pool(
    database_uri: &str,
    max_connections: u32,
    idle_timeout: Duration,
) -> DbThreadPool {
    DbThreadPool::builder()
        .max_size(max_connections)
        .idle_timeout(Some(idle_timeout))
        .build(ConnectionManager::new(database_uri))
        .expect("Failed to create DB thread pool")
}

#[derive(Debug)]
pub enum DaoError {
    DbThreadPoolFailure(r2d2::Error),
    QueryFailure(diesel::result::Error),
    NotFound(&'static str),
    PermissionDenied(&'static str),
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbThreadPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
            DaoError::NotFound(entity) => {
                write!(f, "DaoError: No such {entity}")
            }
            DaoError::PermissionDenied(entity) => {
                write!(f, "DaoError: Acting user does not own {entity}")
            }
        }
    }
}

impl From<r2d2::Error> for DaoError {
    fn from(error: r2d2::Error) -> Self {
        DaoError::DbThreadPoolFailure(error)
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        DaoError::QueryFailure(error)
    }
}

#[cfg(test)]
pub mod test_utils {
    use chrono::{NaiveDateTime, Timelike, Utc};
    use once_cell::sync::Lazy;
    use uuid::Uuid;

    use crate::db::{create_db_thread_pool, DbThreadPool};
    use crate::models::budget::NewBudget;
    use crate::models::expense::NewExpense;
    use crate::models::recurring_transaction::NewRecurringTransaction;
    use crate::schema::budgets::dsl::budgets;
    use crate::schema::expenses::dsl::expenses;
    use crate::schema::recurring_transactions::dsl::recurring_transactions;
    use crate::types::{Frequency, TransactionKind};

    use diesel::{dsl, RunQueryDsl};
    use std::time::Duration;

    const DB_URI_VAR: &str = "FINTRACK_TEST_DB_URI";

    pub static DB_THREAD_POOL: Lazy<DbThreadPool> = Lazy::new(|| {
        let db_uri = std::env::var(DB_URI_VAR)
            .unwrap_or_else(|_| panic!("Environment variable {DB_URI_VAR} must be set"));
        create_db_thread_pool(&db_uri, 12, Duration::from_secs(30))
    });

    pub fn db_thread_pool() -> &'static DbThreadPool {
        &DB_THREAD_POOL
    }

    /// Current instant truncated to microseconds, Postgres's timestamp
    /// resolution, so values compare equal after a round trip.
    pub fn now() -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
            .unwrap_or(now)
    }

    pub struct RecurringTransactionFixture {
        pub user_id: Uuid,
        pub frequency: Frequency,
        pub start_date: NaiveDateTime,
        pub end_date: Option<NaiveDateTime>,
        pub next_occurrence: NaiveDateTime,
        pub is_active: bool,
        pub auto_create: bool,
        pub amount_cents: i64,
        pub category_id: Uuid,
        pub wallet_id: Uuid,
    }

    impl Default for RecurringTransactionFixture {
        fn default() -> Self {
            let start = now();
            Self {
                user_id: Uuid::now_v7(),
                frequency: Frequency::Monthly,
                start_date: start,
                end_date: None,
                next_occurrence: start,
                is_active: true,
                auto_create: true,
                amount_cents: 500_000,
                category_id: Uuid::now_v7(),
                wallet_id: Uuid::now_v7(),
            }
        }
    }

    pub fn insert_recurring_transaction(fixture: &RecurringTransactionFixture) -> Uuid {
        let id = Uuid::now_v7();
        let timestamp = now();

        let new_transaction = NewRecurringTransaction {
            id,
            user_id: fixture.user_id,
            title: "Test recurring transaction",
            amount_cents: fixture.amount_cents,
            transaction_kind: TransactionKind::Expense,
            category_id: fixture.category_id,
            wallet_id: fixture.wallet_id,
            frequency: fixture.frequency,
            start_date: fixture.start_date,
            end_date: fixture.end_date,
            next_occurrence: fixture.next_occurrence,
            last_occurrence: None,
            description: None,
            is_active: fixture.is_active,
            auto_create: fixture.auto_create,
            reminder_days_before: 1,
            created_at: timestamp,
            updated_at: timestamp,
        };

        dsl::insert_into(recurring_transactions)
            .values(&new_transaction)
            .execute(&mut db_thread_pool().get().expect("Failed to get DB connection"))
            .expect("Failed to insert recurring transaction");

        id
    }

    pub fn insert_expense(
        user_id: Uuid,
        category_id: Uuid,
        amount_cents: i64,
        expense_date: NaiveDateTime,
    ) -> Uuid {
        let id = Uuid::now_v7();
        let timestamp = now();

        let new_expense = NewExpense {
            id,
            user_id,
            title: "Test expense",
            amount_cents,
            transaction_kind: TransactionKind::Expense,
            category_id,
            wallet_id: Uuid::now_v7(),
            description: None,
            expense_date,
            recurring_transaction_id: None,
            created_at: timestamp,
            updated_at: timestamp,
        };

        dsl::insert_into(expenses)
            .values(&new_expense)
            .execute(&mut db_thread_pool().get().expect("Failed to get DB connection"))
            .expect("Failed to insert expense");

        id
    }

    pub fn insert_budget(
        user_id: Uuid,
        category_id: Uuid,
        amount_cents: i64,
        start_date: NaiveDateTime,
        end_date: Option<NaiveDateTime>,
        is_active: bool,
    ) -> Uuid {
        let id = Uuid::now_v7();
        let timestamp = now();

        let new_budget = NewBudget {
            id,
            user_id,
            category_id,
            amount_cents,
            start_date,
            end_date,
            is_active,
            created_at: timestamp,
            updated_at: timestamp,
        };

        dsl::insert_into(budgets)
            .values(&new_budget)
            .execute(&mut db_thread_pool().get().expect("Failed to get DB connection"))
            .expect("Failed to insert budget");

        id
    }
}

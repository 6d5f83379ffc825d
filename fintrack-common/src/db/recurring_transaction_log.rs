use diesel::{ExpressionMethods, JoinOnDsl, OptionalExtension, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::recurring_transaction_log::RecurringTransactionLog;
use crate::schema::recurring_transaction_logs as log_fields;
use crate::schema::recurring_transaction_logs::dsl::recurring_transaction_logs;
use crate::schema::recurring_transactions as recurring_transaction_fields;
use crate::schema::recurring_transactions::dsl::recurring_transactions;

/// Read/delete surface over the processing audit trail. Log rows are only
/// ever written by the recurrence processor; ownership is established
/// through the parent recurring transaction.
pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<RecurringTransactionLog>, DaoError> {
        Ok(recurring_transaction_logs
            .inner_join(recurring_transactions)
            .filter(recurring_transaction_fields::user_id.eq(user_id))
            .order(log_fields::executed_date.desc())
            .select(log_fields::all_columns)
            .get_results::<RecurringTransactionLog>(&mut self.db_thread_pool.get()?)?)
    }

    pub fn list_for_recurring(
        &self,
        recurring_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<RecurringTransactionLog>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let owner = recurring_transactions
            .find(recurring_id)
            .select(recurring_transaction_fields::user_id)
            .get_result::<Uuid>(&mut db_connection)
            .optional()?
            .ok_or(DaoError::NotFound("recurring transaction"))?;

        if owner != user_id {
            return Err(DaoError::PermissionDenied("recurring transaction"));
        }

        Ok(recurring_transaction_logs
            .filter(log_fields::recurring_transaction_id.eq(recurring_id))
            .order(log_fields::executed_date.desc())
            .get_results::<RecurringTransactionLog>(&mut db_connection)?)
    }

    pub fn delete(&self, log_id: Uuid, user_id: Uuid) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let owner = recurring_transaction_logs
                    .inner_join(recurring_transactions.on(
                        recurring_transaction_fields::id
                            .eq(log_fields::recurring_transaction_id),
                    ))
                    .filter(log_fields::id.eq(log_id))
                    .select(recurring_transaction_fields::user_id)
                    .get_result::<Uuid>(conn)
                    .optional()?
                    .ok_or(DaoError::NotFound("recurring transaction log"))?;

                if owner != user_id {
                    return Err(DaoError::PermissionDenied("recurring transaction log"));
                }

                diesel::delete(recurring_transaction_logs.filter(log_fields::id.eq(log_id)))
                    .execute(conn)?;

                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::recurring_transaction::Dao as RecurringTransactionDao;
    use crate::db::test_utils::{
        self, insert_recurring_transaction, RecurringTransactionFixture,
    };

    #[test]
    #[ignore = "requires a running Postgres instance (FINTRACK_TEST_DB_URI)"]
    fn test_log_listing_and_owner_scoped_deletion() {
        let dao = Dao::new(test_utils::db_thread_pool());
        let recurring_dao = RecurringTransactionDao::new(test_utils::db_thread_pool());

        let fixture = RecurringTransactionFixture::default();
        let recurring_id = insert_recurring_transaction(&fixture);

        recurring_dao
            .process_recurring(recurring_id, test_utils::now())
            .unwrap();

        let logs = dao.list_for_recurring(recurring_id, fixture.user_id).unwrap();
        assert_eq!(logs.len(), 1);

        let log_id = logs[0].id;

        assert!(matches!(
            dao.delete(log_id, Uuid::now_v7()),
            Err(DaoError::PermissionDenied(_)),
        ));

        dao.delete(log_id, fixture.user_id).unwrap();
        assert!(dao
            .list_for_recurring(recurring_id, fixture.user_id)
            .unwrap()
            .is_empty());
    }
}

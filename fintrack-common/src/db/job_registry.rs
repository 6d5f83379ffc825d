use chrono::NaiveDateTime;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};

use crate::db::{DaoError, DbThreadPool};
use crate::models::job_registry_item::NewJobRegistryItem;
use crate::schema::job_registry as job_registry_fields;
use crate::schema::job_registry::dsl::job_registry;

/// Where the runner keeps each job's last run instant. The Postgres `Dao`
/// makes the once-per-day guarantee survive a process restart.
pub trait LastRunStore: Send + Sync {
    fn get_last_run(&self, job_name: &str) -> Result<Option<NaiveDateTime>, DaoError>;
    fn set_last_run(&self, job_name: &str, timestamp: NaiveDateTime) -> Result<(), DaoError>;
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

    pub fn get_job_last_run_timestamp(
        &self,
        job_name: &str,
    ) -> Result<Option<NaiveDateTime>, DaoError> {
        Ok(job_registry
            .select(job_registry_fields::last_run_timestamp)
            .find(job_name)
            .get_result(&mut self.db_thread_pool.get()?)
            .optional()?)
    }

    pub fn set_job_last_run_timestamp(
        &self,
        job_name: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), DaoError> {
        let registry_item = NewJobRegistryItem {
            job_name,
            last_run_timestamp: timestamp,
        };

        dsl::insert_into(job_registry)
            .values(&registry_item)
            .on_conflict(job_registry_fields::job_name)
            .do_update()
            .set(job_registry_fields::last_run_timestamp.eq(timestamp))
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }
}

impl LastRunStore for Dao {
    fn get_last_run(&self, job_name: &str) -> Result<Option<NaiveDateTime>, DaoError> {
        self.get_job_last_run_timestamp(job_name)
    }

    fn set_last_run(&self, job_name: &str, timestamp: NaiveDateTime) -> Result<(), DaoError> {
        self.set_job_last_run_timestamp(job_name, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use uuid::Uuid;

    use crate::db::test_utils;

    #[test]
    #[ignore = "requires a running Postgres instance (FINTRACK_TEST_DB_URI)"]
    fn test_job_registry_persists_and_updates_timestamps() {
        let dao = Dao::new(test_utils::db_thread_pool());
        let job_name = format!("test-job-{}", Uuid::now_v7());

        assert!(dao.get_job_last_run_timestamp(&job_name).unwrap().is_none());

        let timestamp = test_utils::now();
        dao.set_job_last_run_timestamp(&job_name, timestamp).unwrap();
        assert_eq!(
            dao.get_job_last_run_timestamp(&job_name).unwrap(),
            Some(timestamp),
        );

        let later = timestamp + Duration::seconds(60);
        dao.set_job_last_run_timestamp(&job_name, later).unwrap();
        assert_eq!(dao.get_job_last_run_timestamp(&job_name).unwrap(), Some(later));
    }
}

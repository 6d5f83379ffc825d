use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::{DaoError, DbThreadPool};
use crate::models::budget::Budget;
use crate::schema::budgets as budget_fields;
use crate::schema::budgets::dsl::budgets;

/// What the budget-threshold check needs from the budget repository. Only
/// active budgets participate in threshold checks.
pub trait BudgetStore: Send + Sync {
    fn find_active_by_category(&self, category_id: Uuid) -> Result<Vec<Budget>, DaoError>;
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

    pub fn find_active_by_category(&self, category_id: Uuid) -> Result<Vec<Budget>, DaoError> {
        Ok(budgets
            .filter(budget_fields::category_id.eq(category_id))
            .filter(budget_fields::is_active.eq(true))
            .order(budget_fields::start_date.desc())
            .get_results::<Budget>(&mut self.db_thread_pool.get()?)?)
    }
}

impl BudgetStore for Dao {
    fn find_active_by_category(&self, category_id: Uuid) -> Result<Vec<Budget>, DaoError> {
        Dao::find_active_by_category(self, category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_utils::{self, insert_budget};

    #[test]
    #[ignore = "requires a running Postgres instance (FINTRACK_TEST_DB_URI)"]
    fn test_find_active_by_category_excludes_inactive_and_foreign_categories() {
        let dao = Dao::new(test_utils::db_thread_pool());
        let user_id = Uuid::now_v7();
        let category_id = Uuid::now_v7();
        let now = test_utils::now();

        let active = insert_budget(user_id, category_id, 50_000, now, None, true);
        let inactive = insert_budget(user_id, category_id, 50_000, now, None, false);
        let other_category =
            insert_budget(user_id, Uuid::now_v7(), 50_000, now, None, true);

        let found: Vec<Uuid> = dao
            .find_active_by_category(category_id)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();

        assert!(found.contains(&active));
        assert!(!found.contains(&inactive));
        assert!(!found.contains(&other_category));
    }
}

use fintrack_common::db::budget::{BudgetStore, Dao as BudgetDao};
use fintrack_common::db::create_db_thread_pool;
use fintrack_common::db::expense::{Dao as ExpenseDao, ExpenseStore};
use fintrack_common::db::job_queue::{Dao as JobQueueDao, JobQueue, RetryPolicy};
use fintrack_common::db::job_registry::{Dao as JobRegistryDao, LastRunStore};
use fintrack_common::db::recurring_transaction::{
    Dao as RecurringTransactionDao, RecurringTransactionStore,
};
use fintrack_common::events::{EventBus, EventKind};

use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode};
use futures::future;
use std::io::Write as _;
use std::sync::Arc;
use zeroize::Zeroizing;

mod env;
mod jobs;
mod queue;
mod runner;
mod subscribers;

use jobs::DispatchDueRecurringJob;
use queue::handlers::{
    CheckBudgetLimitHandler, ProcessRecurringHandler, ProcessSingleBudgetHandler,
};
use queue::WorkerPool;
use runner::JobRunner;
use subscribers::{EnqueueBudgetCheck, NotificationRelay};

fn main() {
    let db_uri = Zeroizing::new(format!(
        "postgres://{}:{}@{}:{}/{}",
        env::CONF.db_username,
        env::CONF.db_password,
        env::CONF.db_hostname,
        env::CONF.db_port,
        env::CONF.db_name,
    ));

    let db_thread_pool = create_db_thread_pool(
        &db_uri,
        env::CONF.db_max_connections,
        env::CONF.db_idle_timeout,
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(env::CONF.worker_threads)
        .max_blocking_threads(env::CONF.max_blocking_threads)
        .enable_all()
        .build()
        .expect("Failed to launch asynchronous runtime")
        .block_on(async move {
            Logger::try_with_str(&env::CONF.log_level)
                .expect(
                    "Invalid log level. Options: ERROR, WARN, INFO, DEBUG, TRACE. \
                     Example: `info, my::critical::module=trace`",
                )
                .log_to_file(FileSpec::default().directory("./logs"))
                .rotate(
                    Criterion::Age(Age::Day),
                    Naming::Timestamps,
                    Cleanup::KeepLogAndCompressedFiles(60, 365),
                )
                .cleanup_in_background_thread(true)
                .duplicate_to_stdout(Duplicate::All)
                .write_mode(WriteMode::BufferAndFlush)
                .format(|writer, now, record| {
                    write!(
                        writer,
                        "{:5} | {} | {}:{} | {}",
                        record.level(),
                        now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                        record.module_path().unwrap_or("<unknown>"),
                        record.line().unwrap_or(0),
                        record.args()
                    )
                })
                .use_utc()
                .start()
                .expect("Failed to start logger");

            let retry_policy = RetryPolicy {
                max_attempts: env::CONF.job_max_attempts,
                backoff_base_secs: env::CONF.job_backoff_base_secs,
            };

            let recurring_transaction_store: Arc<dyn RecurringTransactionStore> =
                Arc::new(RecurringTransactionDao::new(&db_thread_pool));
            let expense_store: Arc<dyn ExpenseStore> =
                Arc::new(ExpenseDao::new(&db_thread_pool));
            let budget_store: Arc<dyn BudgetStore> = Arc::new(BudgetDao::new(&db_thread_pool));
            let job_queue: Arc<dyn JobQueue> = Arc::new(JobQueueDao::new(&db_thread_pool));

            let mut event_bus = EventBus::new();
            event_bus.register(
                EventKind::ExpenseCreated,
                Arc::new(EnqueueBudgetCheck::new(Arc::clone(&job_queue), retry_policy)),
            );
            event_bus.register(EventKind::ExpenseCreated, Arc::new(NotificationRelay));
            event_bus.register(
                EventKind::RecurringExpenseExecuted,
                Arc::new(NotificationRelay),
            );
            event_bus.register(EventKind::BudgetLimitExceeded, Arc::new(NotificationRelay));
            let event_bus = Arc::new(event_bus);

            let mut worker_pool = WorkerPool::new(
                db_thread_pool.clone(),
                env::CONF.queue_poll_interval,
                env::CONF.queue_batch_size,
            );
            worker_pool.register(Arc::new(ProcessRecurringHandler::new(
                Arc::clone(&recurring_transaction_store),
                Arc::clone(&event_bus),
            )));
            worker_pool.register(Arc::new(CheckBudgetLimitHandler::new(
                Arc::clone(&expense_store),
                Arc::clone(&budget_store),
                Arc::clone(&job_queue),
                retry_policy,
            )));
            worker_pool.register(Arc::new(ProcessSingleBudgetHandler::new(
                Arc::clone(&expense_store),
                Arc::clone(&event_bus),
            )));

            let last_run_store: Arc<dyn LastRunStore> =
                Arc::new(JobRegistryDao::new(&db_thread_pool));
            let mut job_runner =
                JobRunner::new(env::CONF.runner_update_frequency, last_run_store);

            job_runner
                .register(
                    Box::new(DispatchDueRecurringJob::new(
                        Arc::clone(&recurring_transaction_store),
                        Arc::clone(&job_queue),
                        retry_policy,
                    )),
                    env::CONF.daily_dispatch_time,
                )
                .await;

            future::join(job_runner.start(), worker_pool.start()).await;
        });

    unsafe {
        env::CONF.zeroize();
    }
}

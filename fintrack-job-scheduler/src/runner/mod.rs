use fintrack_common::db::job_registry::LastRunStore;

use chrono::{NaiveDateTime, NaiveTime, Utc};
use futures::future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;

use crate::jobs::Job;

struct JobContainer {
    job: Box<dyn Job>,
    daily_run_time: NaiveTime,
    last_run_time: Option<NaiveDateTime>,
}

/// Decides whether a daily job should fire: today's fire time has arrived
/// and the job has not yet run at or after it. This holds the once-per-day
/// guarantee, including across restarts when `last_run` is reloaded from
/// the registry.
fn is_due(now: NaiveDateTime, last_run: Option<NaiveDateTime>, daily_run_time: NaiveTime) -> bool {
    let todays_fire_time = now.date().and_time(daily_run_time);

    if now < todays_fire_time {
        return false;
    }

    match last_run {
        Some(last_run) => last_run < todays_fire_time,
        None => true,
    }
}

/// Fires registered jobs once per day at their configured time. Jobs are
/// registered in-memory at every startup, so a restart never leaves a stale
/// trigger behind; only the last-run timestamps persist.
pub struct JobRunner {
    jobs: Vec<JobContainer>,
    update_frequency: Duration,
    last_run_store: Arc<dyn LastRunStore>,
}

impl JobRunner {
    pub fn new(update_frequency: Duration, last_run_store: Arc<dyn LastRunStore>) -> Self {
        Self {
            jobs: Vec::new(),
            update_frequency,
            last_run_store,
        }
    }

    pub async fn register(&mut self, job: Box<dyn Job>, daily_run_time: NaiveTime) {
        let job_name_ref = job.name();

        log::info!(
            "Registered job \"{}\" to run daily at {}",
            job_name_ref,
            daily_run_time,
        );

        let store = Arc::clone(&self.last_run_store);
        let last_run_time = tokio::task::spawn_blocking(move || {
            store.get_last_run(job_name_ref).unwrap_or_else(|e| {
                log::error!(
                    "Failed to get last run timestamp for job \"{}\": {}",
                    job_name_ref,
                    e,
                );
                None
            })
        })
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to join Tokio task: {}", e);
            None
        });

        self.jobs.push(JobContainer {
            job,
            daily_run_time,
            last_run_time,
        });
    }

    pub async fn start(&mut self) -> ! {
        loop {
            let before = Instant::now();
            let now = Utc::now().naive_utc();

            let mut job_names = Vec::with_capacity(self.jobs.len());
            let mut job_futures = Vec::with_capacity(self.jobs.len());
            let mut record_job_run_futures = Vec::with_capacity(self.jobs.len());

            for job_container in &mut self.jobs {
                let is_time_to_run = is_due(
                    now,
                    job_container.last_run_time,
                    job_container.daily_run_time,
                );

                if is_time_to_run && job_container.job.is_ready() {
                    let name_ref = job_container.job.name();
                    log::info!("Executing job \"{}\"", name_ref);

                    job_container.last_run_time = Some(now);
                    job_names.push(name_ref);
                    job_futures.push(job_container.job.execute());

                    let store = Arc::clone(&self.last_run_store);
                    record_job_run_futures.push(tokio::task::spawn_blocking(move || {
                        store.set_last_run(name_ref, now)
                    }));
                }
            }

            let (job_results, recording_results) = future::join(
                future::join_all(job_futures),
                future::join_all(record_job_run_futures),
            )
            .await;

            for (i, result) in job_results.into_iter().enumerate() {
                if let Err(e) = result {
                    log::error!("{}", e);
                } else {
                    log::info!("Job \"{}\" finished successfully", job_names[i]);
                }
            }

            for result in recording_results.into_iter() {
                match result {
                    Ok(Err(e)) => log::error!("Error recording job run: {}", e),
                    Err(e) => log::error!("Failed to join Tokio task: {}", e),
                    Ok(Ok(())) => (),
                }
            }

            let after = Instant::now();
            let delta = after - before;

            if delta < self.update_frequency {
                time::sleep(self.update_frequency - delta).await;
            }
        }
    }
}

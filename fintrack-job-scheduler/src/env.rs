use chrono::NaiveTime;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroize;

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "FINTRACK_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "FINTRACK_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "FINTRACK_DB_HOSTNAME";
const DB_PORT_VAR: &str = "FINTRACK_DB_PORT";
const DB_NAME_VAR: &str = "FINTRACK_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "FINTRACK_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "FINTRACK_DB_IDLE_TIMEOUT_SECS";

const WORKER_THREADS_VAR: &str = "FINTRACK_WORKER_THREADS";
const MAX_BLOCKING_THREADS_VAR: &str = "FINTRACK_MAX_BLOCKING_THREADS";

const RUNNER_UPDATE_FREQUENCY_SECS_VAR: &str = "FINTRACK_RUNNER_UPDATE_FREQUENCY_SECS";
const DAILY_DISPATCH_TIME_VAR: &str = "FINTRACK_DAILY_DISPATCH_TIME";

const QUEUE_POLL_INTERVAL_SECS_VAR: &str = "FINTRACK_QUEUE_POLL_INTERVAL_SECS";
const QUEUE_BATCH_SIZE_VAR: &str = "FINTRACK_QUEUE_BATCH_SIZE";
const JOB_MAX_ATTEMPTS_VAR: &str = "FINTRACK_JOB_MAX_ATTEMPTS";
const JOB_BACKOFF_BASE_SECS_VAR: &str = "FINTRACK_JOB_BACKOFF_BASE_SECS";

const LOG_LEVEL_VAR: &str = "FINTRACK_LOG_LEVEL";

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    #[zeroize(skip)]
    pub worker_threads: usize,
    #[zeroize(skip)]
    pub max_blocking_threads: usize,

    #[zeroize(skip)]
    pub runner_update_frequency: Duration,
    /// Time of day (UTC) at which the daily due-set dispatch fires.
    #[zeroize(skip)]
    pub daily_dispatch_time: NaiveTime,

    #[zeroize(skip)]
    pub queue_poll_interval: Duration,
    #[zeroize(skip)]
    pub queue_batch_size: i64,
    #[zeroize(skip)]
    pub job_max_attempts: i32,
    #[zeroize(skip)]
    pub job_backoff_base_secs: i32,

    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let daily_dispatch_time_raw =
            env_var_or(DAILY_DISPATCH_TIME_VAR, String::from("00:57"));
        let daily_dispatch_time = NaiveTime::parse_from_str(&daily_dispatch_time_raw, "%H:%M")
            .map_err(|_| ConfigError::InvalidVar(DAILY_DISPATCH_TIME_VAR))?;

        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            worker_threads: env_var_or(WORKER_THREADS_VAR, num_cpus::get()),
            max_blocking_threads: env_var_or(MAX_BLOCKING_THREADS_VAR, num_cpus::get() * 8),

            runner_update_frequency: Duration::from_secs(env_var_or(
                RUNNER_UPDATE_FREQUENCY_SECS_VAR,
                30,
            )),
            daily_dispatch_time,

            queue_poll_interval: Duration::from_secs(env_var_or(
                QUEUE_POLL_INTERVAL_SECS_VAR,
                5,
            )),
            queue_batch_size: env_var_or(QUEUE_BATCH_SIZE_VAR, 16),
            job_max_attempts: env_var_or(JOB_MAX_ATTEMPTS_VAR, 3),
            job_backoff_base_secs: env_var_or(JOB_BACKOFF_BASE_SECS_VAR, 5),

            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across
    /// an async boundary. Generally, this should only be used at the end of
    /// the main function once all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(key) => {
                write!(f, "ConfigError: Environment variable {key} must be set")
            }
            ConfigError::InvalidVar(key) => {
                write!(f, "ConfigError: Environment variable {key} is invalid")
            }
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    var.parse().map_err(|_| ConfigError::InvalidVar(key))
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

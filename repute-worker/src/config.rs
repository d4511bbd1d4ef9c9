/// Worker configuration
///
/// Built with the `config` crate: compiled-in defaults, overridden by
/// `WORKER_*` environment variables. The connection strings are shared
/// with the API and read without the prefix.
///
/// | Variable                      | Default |
/// |-------------------------------|---------|
/// | `WORKER_POLL_INTERVAL_SECS`   | 1       |
/// | `WORKER_MAX_CONCURRENT_JOBS`  | 10      |
/// | `WORKER_BATCH_SIZE`           | 5       |
/// | `WORKER_MAX_ATTEMPTS`         | 5       |
/// | `WORKER_BASE_BACKOFF_SECS`    | 2       |
/// | `WORKER_STALE_AFTER_SECS`     | 300     |
/// | `WORKER_SHUTDOWN_GRACE_SECS`  | 30      |
/// | `DATABASE_URL`                | required |
/// | `REDIS_URL`                   | unset: notifications are dropped |

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
    pub max_concurrent_jobs: usize,
    pub batch_size: usize,

    /// Claims allowed per job before it stays failed
    pub max_attempts: i32,

    pub base_backoff_secs: u64,

    /// A job running longer than this is treated as abandoned at start-up
    pub stale_after_secs: u64,

    /// How long shutdown waits for in-flight jobs
    pub shutdown_grace_secs: u64,

    pub database_url: String,
    pub redis_url: Option<String>,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars.get("DATABASE_URL").cloned();
        let redis_url = vars
            .get("REDIS_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let settings = Config::builder()
            .set_default("poll_interval_secs", 1_i64)?
            .set_default("max_concurrent_jobs", 10_i64)?
            .set_default("batch_size", 5_i64)?
            .set_default("max_attempts", 5_i64)?
            .set_default("base_backoff_secs", 2_i64)?
            .set_default("stale_after_secs", 300_i64)?
            .set_default("shutdown_grace_secs", 30_i64)?
            .add_source(
                Environment::with_prefix("WORKER")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .set_override_option("database_url", database_url)?
            .set_override_option("redis_url", redis_url)?
            .build()?;

        let config: WorkerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Message(msg.to_string()));

        if self.database_url.trim().is_empty() {
            return invalid("DATABASE_URL must not be empty");
        }
        if self.max_concurrent_jobs == 0 {
            return invalid("WORKER_MAX_CONCURRENT_JOBS must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("WORKER_BATCH_SIZE must be at least 1");
        }
        if self.max_attempts < 1 {
            return invalid("WORKER_MAX_ATTEMPTS must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            return invalid("WORKER_POLL_INTERVAL_SECS must be at least 1");
        }
        Ok(())
    }
}

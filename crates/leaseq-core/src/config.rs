use std::time::Duration;

use chrono::TimeDelta;
use uuid::Uuid;

use crate::error::AppError;

const DEFAULT_LEASE_DURATION_SECS: i64 = 3 * 60 * 60;
const DEFAULT_BATCH_SIZE: u32 = 10;
const DEFAULT_MAX_BATCH_SIZE: u32 = 100;
const MAX_LEASE_DURATION_SECS: i64 = 30 * 24 * 60 * 60;

/// Fixed parameters of the queue service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long each claimed item stays locked before it is reclaimable.
    pub lease_duration: TimeDelta,
    /// Batch size used when a claim does not specify one.
    pub default_batch_size: u32,
    /// Largest batch a single claim may request.
    pub max_batch_size: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_duration: TimeDelta::seconds(DEFAULT_LEASE_DURATION_SECS),
            default_batch_size: DEFAULT_BATCH_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl QueueConfig {
    /// Read configuration from environment variables.
    ///
    /// - `LEASEQ_LEASE_DURATION_SECS` (optional, defaults to 10800)
    /// - `LEASEQ_DEFAULT_BATCH_SIZE` (optional, defaults to 10)
    /// - `LEASEQ_MAX_BATCH_SIZE` (optional, defaults to 100)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`QueueConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let lease_secs = match lookup("LEASEQ_LEASE_DURATION_SECS") {
            None => DEFAULT_LEASE_DURATION_SECS,
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid LEASEQ_LEASE_DURATION_SECS '{raw}': must be a positive integer"
                ))
            })?,
        };
        let lease_duration = TimeDelta::try_seconds(lease_secs).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Invalid LEASEQ_LEASE_DURATION_SECS '{lease_secs}': out of range"
            ))
        })?;
        let default_batch_size = parse_u32(&lookup, "LEASEQ_DEFAULT_BATCH_SIZE")?
            .unwrap_or(defaults.default_batch_size);
        let max_batch_size =
            parse_u32(&lookup, "LEASEQ_MAX_BATCH_SIZE")?.unwrap_or(defaults.max_batch_size);

        let config = Self {
            lease_duration,
            default_batch_size,
            max_batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_lease_duration(mut self, duration: TimeDelta) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn with_default_batch_size(mut self, size: u32) -> Self {
        self.default_batch_size = size;
        self
    }

    pub fn with_max_batch_size(mut self, size: u32) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.lease_duration <= TimeDelta::zero() {
            return Err(AppError::ConfigError(
                "lease duration must be positive".into(),
            ));
        }
        if self.lease_duration > TimeDelta::seconds(MAX_LEASE_DURATION_SECS) {
            return Err(AppError::ConfigError(format!(
                "lease duration of {}s exceeds the {MAX_LEASE_DURATION_SECS}s limit",
                self.lease_duration.num_seconds()
            )));
        }
        if self.default_batch_size == 0 {
            return Err(AppError::ConfigError(
                "default batch size must be at least 1".into(),
            ));
        }
        if self.max_batch_size < self.default_batch_size {
            return Err(AppError::ConfigError(format!(
                "max batch size {} is below default batch size {}",
                self.max_batch_size, self.default_batch_size
            )));
        }
        Ok(())
    }
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
        }),
    }
}

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// Sleep between claims when the queue is empty.
    pub poll_interval: Duration,
    /// Items analyzed in parallel within one batch.
    pub concurrency: usize,
    /// Extra attempts for a submit that failed with a retryable error.
    pub submit_retries: u32,
    /// Requested batch size; `None` uses the server default.
    pub batch_size: Option<i64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", &Uuid::new_v4().to_string()[..8]),
            poll_interval: Duration::from_secs(5),
            concurrency: 4,
            submit_retries: 3,
            batch_size: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_submit_retries(mut self, retries: u32) -> Self {
        self.submit_retries = retries;
        self
    }

    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = Some(size);
        self
    }
}

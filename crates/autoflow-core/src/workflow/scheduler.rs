//! Cron scheduler wrapping `tokio-cron-scheduler` for schedule triggers.
//!
//! Provides:
//! - Cron expression normalization (5-field standard -> 6-field with seconds)
//! - Validation through `croner`, shared with CRUD-time workflow validation
//! - Per-trigger job lifecycle (schedule, unschedule, start, stop)

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use super::trigger::TriggerKey;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during scheduling operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Failed to create or manipulate a cron job.
    #[error("scheduler error: {0}")]
    JobError(String),

    #[error("Invalid cron expression: {0}")]
    InvalidSchedule(String),

    #[error("scheduler not started")]
    NotStarted,
}

// ---------------------------------------------------------------------------
// Expression handling
// ---------------------------------------------------------------------------

/// Normalize a cron expression to the 6-field form the job scheduler expects.
///
/// A standard 5-field expression gets a `0` seconds field prepended; a
/// 6-field expression is returned as-is. Anything else is rejected.
pub fn normalize_schedule(input: &str) -> Result<String, SchedulerError> {
    let trimmed = input.trim();
    let fields = trimmed.split_whitespace().count();
    match fields {
        5 => Ok(format!("0 {}", trimmed.split_whitespace().collect::<Vec<_>>().join(" "))),
        6 => Ok(trimmed.split_whitespace().collect::<Vec<_>>().join(" ")),
        _ => Err(SchedulerError::InvalidSchedule(input.to_string())),
    }
}

/// Check that `input` is a cron expression that will actually parse.
pub fn validate_cron(input: &str) -> Result<(), SchedulerError> {
    let normalized = normalize_schedule(input)?;
    normalized
        .parse::<croner::Cron>()
        .map(|_| ())
        .map_err(|_| SchedulerError::InvalidSchedule(input.to_string()))
}

// ---------------------------------------------------------------------------
// CronScheduler
// ---------------------------------------------------------------------------

/// Callback type invoked when a cron trigger fires.
pub type CronCallback =
    Arc<dyn Fn(DateTime<Utc>) -> futures_util::future::BoxFuture<'static, ()> + Send + Sync>;

/// Cron scheduler that wraps `tokio-cron-scheduler::JobScheduler`.
///
/// Jobs are tracked per trigger key so a workflow with several schedule
/// triggers can be torn down precisely.
pub struct CronScheduler {
    inner: Arc<RwLock<Option<JobScheduler>>>,
    /// trigger key -> job UUID assigned by tokio-cron-scheduler.
    jobs: Arc<RwLock<HashMap<TriggerKey, Uuid>>>,
}

impl CronScheduler {
    /// Create a new cron scheduler (not yet started).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the scheduler. Must be called before scheduling triggers.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.write().await;
        if inner.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;

        *inner = Some(scheduler);
        tracing::info!("cron scheduler started");
        Ok(())
    }

    /// Stop the scheduler and forget all jobs.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.write().await;
        if let Some(mut scheduler) = inner.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| SchedulerError::JobError(e.to_string()))?;
            tracing::info!("cron scheduler stopped");
        }
        self.jobs.write().await.clear();
        Ok(())
    }

    /// Install a job for `key`. Any job already registered under the key is
    /// removed first.
    pub async fn schedule(
        &self,
        key: TriggerKey,
        cron: &str,
        callback: CronCallback,
    ) -> Result<Uuid, SchedulerError> {
        validate_cron(cron)?;
        let cron_expr = normalize_schedule(cron)?;

        let inner = self.inner.read().await;
        let scheduler = inner.as_ref().ok_or(SchedulerError::NotStarted)?;

        let workflow_id = key.workflow_id;
        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let cb = callback.clone();
            Box::pin(async move {
                let now = Utc::now();
                tracing::debug!(%workflow_id, %now, "cron trigger fired");
                cb(now).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{cron} ({e})")))?;

        let job_id = job.guid();

        // Hold the registry lock across replace + add so no caller observes
        // the key pointing at a removed job.
        let mut jobs = self.jobs.write().await;
        if let Some(previous) = jobs.remove(&key) {
            scheduler
                .remove(&previous)
                .await
                .map_err(|e| SchedulerError::JobError(e.to_string()))?;
        }
        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;
        jobs.insert(key.clone(), job_id);

        tracing::info!(%workflow_id, trigger_id = %key.trigger_id, %job_id, cron = %cron_expr, "schedule trigger armed");
        Ok(job_id)
    }

    /// Remove the job registered under `key`. Returns false if none existed.
    pub async fn unschedule(&self, key: &TriggerKey) -> Result<bool, SchedulerError> {
        let mut jobs = self.jobs.write().await;
        let Some(job_id) = jobs.remove(key) else {
            return Ok(false);
        };

        let inner = self.inner.read().await;
        if let Some(scheduler) = inner.as_ref() {
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| SchedulerError::JobError(e.to_string()))?;
        }

        tracing::info!(workflow_id = %key.workflow_id, trigger_id = %key.trigger_id, "schedule trigger removed");
        Ok(true)
    }

    /// Number of live cron jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_scheduled(&self, key: &TriggerKey) -> bool {
        self.jobs.read().await.contains_key(key)
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callback() -> CronCallback {
        Arc::new(|_now| Box::pin(async {}))
    }

    fn key(trigger: &str) -> TriggerKey {
        TriggerKey::new(Uuid::now_v7(), trigger)
    }

    #[test]
    fn test_normalize_standard_5field_cron() {
        assert_eq!(normalize_schedule("*/5 * * * *").unwrap(), "0 */5 * * * *");
    }

    #[test]
    fn test_normalize_6field_cron_passthrough() {
        assert_eq!(normalize_schedule("30 */5 * * * *").unwrap(), "30 */5 * * * *");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_schedule("  0   9 * * 1 ").unwrap(), "0 0 9 * * 1");
    }

    #[test]
    fn test_normalize_wrong_field_count() {
        assert!(normalize_schedule("hourly").is_err());
        assert!(normalize_schedule("* * *").is_err());
    }

    #[test]
    fn test_validate_cron_accepts_standard_expressions() {
        assert!(validate_cron("0 9 * * *").is_ok());
        assert!(validate_cron("*/15 * * * *").is_ok());
        assert!(validate_cron("0 9 * * 1").is_ok());
    }

    #[test]
    fn test_validate_cron_rejects_garbage() {
        let err = validate_cron("not a cron at all").unwrap_err();
        assert_eq!(err.to_string(), "Invalid cron expression: not a cron at all");
        assert!(validate_cron("99 * * * *").is_err());
    }

    #[tokio::test]
    async fn test_schedule_requires_started_scheduler() {
        let scheduler = CronScheduler::new();
        let result = scheduler.schedule(key("t1"), "* * * * *", noop_callback()).await;
        assert!(matches!(result, Err(SchedulerError::NotStarted)));
    }

    #[tokio::test]
    async fn test_schedule_and_unschedule() {
        let scheduler = CronScheduler::new();
        scheduler.start().await.unwrap();

        let k = key("t1");
        scheduler.schedule(k.clone(), "0 9 * * *", noop_callback()).await.unwrap();
        assert_eq!(scheduler.job_count().await, 1);
        assert!(scheduler.is_scheduled(&k).await);

        assert!(scheduler.unschedule(&k).await.unwrap());
        assert_eq!(scheduler.job_count().await, 0);
        assert!(!scheduler.unschedule(&k).await.unwrap());

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rescheduling_same_key_replaces_job() {
        let scheduler = CronScheduler::new();
        scheduler.start().await.unwrap();

        let k = key("t1");
        let first = scheduler.schedule(k.clone(), "0 9 * * *", noop_callback()).await.unwrap();
        let second = scheduler.schedule(k.clone(), "0 10 * * *", noop_callback()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(scheduler.job_count().await, 1);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.job_count().await, 0);
    }

    #[tokio::test]
    async fn test_schedule_rejects_invalid_expression() {
        let scheduler = CronScheduler::new();
        scheduler.start().await.unwrap();
        let result = scheduler.schedule(key("bad"), "61 * * * *", noop_callback()).await;
        assert!(matches!(result, Err(SchedulerError::InvalidSchedule(_))));
        assert_eq!(scheduler.job_count().await, 0);
        scheduler.stop().await.unwrap();
    }
}

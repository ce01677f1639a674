//! Calendar synchronization scheduler for periodic event sync.
//!
//! Cron-based scheduler that re-runs the sync engine's cycle for the last
//! requested view window at fixed intervals. The scheduled poll doubles as
//! the retry mechanism for transient per-calendar failures: nothing is
//! retried within a cycle, the next poll simply runs again.
//!
//! Join handles are tracked, cancellation is explicit, and every
//! asynchronous operation is wrapped in a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::integrations::calendar::sync::SyncEngine;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sync execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: homeboard_domain::constants::DEFAULT_SYNC_CRON.into(),
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Calendar synchronization scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    engine: Arc<SyncEngine>,
}

impl SyncScheduler {
    /// Create a scheduler with the default configuration.
    #[must_use]
    pub fn new(cron_expression: String, engine: Arc<SyncEngine>) -> Self {
        let config = SyncSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, engine)
    }

    /// Create a scheduler with a custom configuration.
    #[must_use]
    pub fn with_config(config: SyncSchedulerConfig, engine: Arc<SyncEngine>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            engine,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    ///
    /// # Errors
    /// Returns `SchedulerError::AlreadyRunning` when started twice, and
    /// creation/start errors from the underlying scheduler.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?;

        start_result.map_err(|source| SchedulerError::StartFailed(source.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    ///
    /// # Errors
    /// Returns `SchedulerError::NotRunning` when not started, and
    /// stop/join errors from the underlying scheduler.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?;

        stop_result.map_err(|source| SchedulerError::StopFailed(source.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|source| SchedulerError::TaskJoinFailed(source.to_string()))?;
        }

        info!("Sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed(source.to_string()))?;
        let cron_expr = self.config.cron_expression.clone();
        let engine = Arc::clone(&self.engine);
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let engine = Arc::clone(&engine);

            Box::pin(async move {
                let started = Instant::now();

                match tokio::time::timeout(job_timeout, engine.sync_last_window()).await {
                    Ok(Ok(Some(report))) => {
                        debug!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            merged = report.merged(),
                            failed = report.failed(),
                            "scheduled sync finished"
                        );
                    }
                    Ok(Ok(None)) => {
                        debug!("scheduled sync skipped, no window requested yet");
                    }
                    Ok(Err(err)) => {
                        error!(error = ?err, "scheduled sync failed");
                    }
                    Err(_) => {
                        warn!(
                            timeout_secs = job_timeout.as_secs(),
                            "scheduled sync timed out"
                        );
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed(source.to_string()))?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered sync job");
        Ok(scheduler)
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("Sync scheduler monitor cancelled");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for scheduling::sync_scheduler.
    use homeboard_core::{CalendarApi, SyncCursorStore};
    use homeboard_domain::constants::FETCH_PADDING_DAYS;

    use super::*;
    use crate::integrations::calendar::oauth::CredentialManager;
    use crate::integrations::calendar::CalendarClient;
    use crate::storage::{KvCredentialStore, KvSyncCursorStore, MemoryKvStore};

    fn test_engine() -> Arc<SyncEngine> {
        let store: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
        let cursors: Arc<dyn SyncCursorStore> =
            Arc::new(KvSyncCursorStore::new(store.clone()));
        let manager = CredentialManager::new(
            homeboard_domain::CalendarSyncConfig::google(
                "test-client",
                "http://localhost:1/oauth/token",
                homeboard_domain::DeploymentMode::Local,
            ),
            Arc::new(KvCredentialStore::new(store)),
            Arc::clone(&cursors),
        );
        let api: Arc<dyn CalendarApi> =
            Arc::new(CalendarClient::new(manager, "http://localhost:1"));
        Arc::new(SyncEngine::new(api, cursors, FETCH_PADDING_DAYS))
    }

    fn fast_config() -> SyncSchedulerConfig {
        SyncSchedulerConfig {
            cron_expression: "*/1 * * * * *".into(),
            job_timeout: Duration::from_secs(5),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_successfully() {
        let mut scheduler = SyncScheduler::with_config(fast_config(), test_engine());

        scheduler.start().await.expect("start succeeds");
        assert!(scheduler.is_running());
        scheduler.stop().await.expect("stop succeeds");
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let mut scheduler = SyncScheduler::with_config(fast_config(), test_engine());

        scheduler.start().await.expect("first start");
        let err = scheduler.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        scheduler.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_after_stop_succeeds() {
        let mut scheduler = SyncScheduler::with_config(fast_config(), test_engine());

        scheduler.start().await.expect("start succeeds");
        scheduler.stop().await.expect("stop succeeds");
        assert!(!scheduler.is_running());

        scheduler.start().await.expect("start again");
        scheduler.stop().await.expect("stop again");
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let mut scheduler = SyncScheduler::with_config(fast_config(), test_engine());
        let err = scheduler.stop().await.expect_err("stop fails");
        assert!(matches!(err, SchedulerError::NotRunning));
    }
}

pub mod tasks;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::error::ConfigError;
use crate::platform::FeedSource;
use crate::scheduler::tasks::{run_entry, PreparedEntry};

/// Wrapper around tokio-cron-scheduler for the webhook jobs
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    /// Create a new scheduler
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Add a recurring cron job
    pub async fn add_cron_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<Uuid>
    where
        F: Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            + Send
            + Sync
            + 'static,
    {
        let cron_expr = normalize_cron(cron_expr);
        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| task())
            .with_context(|| format!("Failed to create cron job: {} ({})", name, cron_expr))?;

        let id = self
            .inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job: {}", name))?;

        info!("Scheduled {} at {} (job {})", name, cron_expr, id);
        Ok(id)
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Cron started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        info!("Cron stopped");
        Ok(())
    }
}

/// Accept classic 5-field cron (minute first) by adding a zero seconds field.
/// 6/7-field expressions and `@` descriptors are passed through.
///
/// The result is parsed by tokio-cron-scheduler, which differs from classic
/// cron in two ways: when both day-of-month and day-of-week are restricted a
/// day must match both (classic cron fires on either), and interval
/// descriptors such as `@every 5m` don't exist. The latter are rejected by
/// [`crate::config::ScheduleEntry::validate`].
pub fn normalize_cron(spec: &str) -> String {
    let spec = spec.trim();
    if spec.starts_with('@') || spec.split_whitespace().count() != 5 {
        return spec.to_string();
    }
    format!("0 {}", spec)
}

/// Run every schedule entry on its cron spec until `cancel` fires.
///
/// Entries are validated and compiled up front, so a bad filter or webhook
/// fails here before anything is scheduled. On cancellation no new firings
/// start and in-flight runs, whose tokens are children of `cancel`, are
/// waited for before returning.
pub async fn run_schedule(
    config: &ScheduleConfig,
    source: Arc<dyn FeedSource>,
    client: Client,
    cancel: CancellationToken,
) -> Result<()> {
    let entries = config
        .schedules
        .iter()
        .map(|entry| PreparedEntry::new(entry, client.clone()))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let mut scheduler = Scheduler::new().await?;
    let tracker = TaskTracker::new();
    let poll_interval = config.poll_interval();

    for entry in entries {
        let entry = Arc::new(entry);
        let name = format!("hook of channel {}", entry.channel);
        let spec = entry.spec.clone();
        let source = source.clone();
        let tracker = tracker.clone();
        let cancel = cancel.clone();

        scheduler
            .add_cron_job(&spec, &name, move || {
                let entry = entry.clone();
                let source = source.clone();
                let cancel = cancel.clone();
                Box::pin(tracker.track_future(async move {
                    run_entry(&entry, source.as_ref(), poll_interval, &cancel).await;
                }))
            })
            .await?;
    }

    scheduler.start().await?;

    cancel.cancelled().await;
    scheduler.shutdown().await?;

    tracker.close();
    if !tracker.is_empty() {
        info!("Waiting for {} running hook(s) to stop", tracker.len());
    }
    tracker.wait().await;
    info!("Cron finished");
    Ok(())
}

//! Run several channel hooks on cron schedules.
//!
//! The config file is either the JSON list format
//! (`[{"Channel": .., "Spec": .., "Timeout": .., "URL": .., "Filter": ..}]`)
//! or TOML with `[[schedule]]` tables and an optional `[http]` section.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tghook::config::ScheduleConfig;
use tghook::platform::telegram::TelegramFeed;
use tghook::scheduler::run_schedule;

#[derive(Parser, Debug)]
#[command(name = "tgschedule", version, about = "Run telegram channel hooks on cron schedules")]
struct Args {
    /// Schedule config file (.json or .toml)
    #[arg(long, env = "TGSCHEDULE_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tghook::init_tracing();

    let args = Args::parse();

    info!("Loading configuration from: {}", args.config.display());
    let config = ScheduleConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!("Configuration loaded successfully");
    info!("  Feed: {}", config.http.feed_base_url);
    info!("  Poll interval: {:?}", config.poll_interval());
    for entry in &config.schedules {
        info!(
            "  Channel {} at '{}' for {} min -> {}",
            entry.channel, entry.spec, entry.timeout, entry.url
        );
    }

    let client = config.http.build_client()?;
    let feed = Arc::new(TelegramFeed::new(
        client.clone(),
        config.http.feed_base_url.clone(),
    ));

    run_schedule(&config, feed, client, tghook::shutdown_token()).await
}

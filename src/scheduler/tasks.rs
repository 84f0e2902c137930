use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ScheduleEntry;
use crate::error::ConfigError;
use crate::filter::Filter;
use crate::hook;
use crate::platform::FeedSource;
use crate::webhook::WebhookClient;

/// A schedule entry with its filter and webhook already built
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub channel: String,
    pub spec: String,
    pub timeout: Duration,
    pub filter: Filter,
    pub webhook: Arc<WebhookClient>,
}

impl PreparedEntry {
    pub fn new(entry: &ScheduleEntry, client: Client) -> Result<Self, ConfigError> {
        entry.validate()?;
        let options = entry.hook_options()?;
        Ok(Self {
            channel: entry.channel.clone(),
            spec: entry.spec.clone(),
            timeout: entry.timeout(),
            filter: options.build_filter()?,
            webhook: Arc::new(options.build_webhook(client)?),
        })
    }
}

/// One firing of a schedule entry: poll the channel with a fresh watermark
/// until the entry's timeout or `parent` cancels it.
///
/// The poller is stopped through its token, never dropped mid-fetch.
pub async fn run_entry(
    entry: &PreparedEntry,
    source: &dyn FeedSource,
    poll_interval: Duration,
    parent: &CancellationToken,
) {
    info!("Start hook of channel {}", entry.channel);
    let token = parent.child_token();

    let job = hook::run_with_filter(
        source,
        &entry.channel,
        poll_interval,
        &token,
        entry.filter.clone(),
        hook::webhook_callback(entry.webhook.clone()),
    );
    tokio::pin!(job);

    let finished = tokio::select! {
        result = &mut job => Some(result),
        _ = tokio::time::sleep(entry.timeout) => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            info!(
                "Timeout of {:?} reached for channel {}",
                entry.timeout, entry.channel
            );
            token.cancel();
            job.await
        }
    };

    if let Err(e) = result {
        error!("Hook of channel {} failed: {}", entry.channel, e);
    }
    info!("End hook of channel {}", entry.channel);
}

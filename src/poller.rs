//! Incremental polling of a channel feed.
//!
//! The poller keeps a watermark (highest message id seen so far) and hands
//! every message above it to a callback exactly once. The first successful
//! fetch of a session only moves the watermark: whatever the channel already
//! shows at startup is treated as known backlog.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::{FeedMessage, FeedSource};

/// Called once per new message with its text and timestamp. The returned
/// future is spawned, never awaited by the poll loop.
pub type MessageCallback =
    Arc<dyn Fn(String, Option<NaiveDateTime>) -> BoxFuture<'static, ()> + Send + Sync>;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Per-session polling state. One instance per channel and session.
#[derive(Debug)]
pub struct WatermarkPoller {
    watermark: u64,
    first_batch: bool,
}

impl Default for WatermarkPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkPoller {
    pub fn new() -> Self {
        Self {
            watermark: 0,
            first_batch: true,
        }
    }

    /// Highest message id seen in this session.
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// True until the first successful fetch has been ingested.
    pub fn is_cold(&self) -> bool {
        self.first_batch
    }

    /// Advance the watermark over one fetched batch and return the messages
    /// that should be delivered, in ascending id order.
    pub fn ingest(&mut self, mut batch: Vec<FeedMessage>) -> Vec<FeedMessage> {
        batch.sort_by_key(|m| m.id);
        let cold = std::mem::replace(&mut self.first_batch, false);

        let mut fresh = Vec::new();
        for message in batch {
            if message.id <= self.watermark {
                continue;
            }
            self.watermark = message.id;
            if !cold {
                fresh.push(message);
            }
        }
        fresh
    }

    /// Poll `channel` every `poll_interval` until `cancel` fires.
    ///
    /// Fetch errors are logged and retried on the next tick. A fetch already
    /// in flight when `cancel` fires is allowed to finish.
    pub async fn run(
        &mut self,
        source: &dyn FeedSource,
        channel: &str,
        poll_interval: Duration,
        cancel: &CancellationToken,
        on_message: MessageCallback,
    ) {
        let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Polling channel {} every {:?}", channel, poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let batch = match source.fetch(channel, self.watermark).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Fetch of channel {} failed: {}", channel, e);
                    continue;
                }
            };

            let cold = self.first_batch;
            let fresh = self.ingest(batch);
            if cold {
                info!(
                    "Channel {} backlog skipped, watermark at {}",
                    channel, self.watermark
                );
            }

            for message in fresh {
                debug!(
                    "MSG {} {} {:?} {}",
                    channel, message.id, message.timestamp, message.text
                );
                tokio::spawn(on_message(message.text, message.timestamp));
            }
        }

        info!(
            "Stopped polling channel {} at message {}",
            channel, self.watermark
        );
    }
}

//! Test doubles shared by the poller, hook and scheduler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::FutureExt;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::platform::{FeedMessage, FeedSource};
use crate::poller::MessageCallback;

pub fn message(id: u64, text: &str) -> FeedMessage {
    FeedMessage {
        id,
        text: text.to_string(),
        timestamp: None,
    }
}

pub fn status_error() -> FetchError {
    FetchError::Status {
        url: "https://t.me/s/test".to_string(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Replays a fixed list of fetch results, then cancels `done` and keeps
/// returning empty batches.
pub struct ScriptedFeed {
    batches: Mutex<VecDeque<Result<Vec<FeedMessage>, FetchError>>>,
    min_ids: Mutex<Vec<u64>>,
    done: CancellationToken,
}

impl ScriptedFeed {
    pub fn new(
        batches: Vec<Result<Vec<FeedMessage>, FetchError>>,
        done: CancellationToken,
    ) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            min_ids: Mutex::new(Vec::new()),
            done,
        }
    }

    /// `min_id` argument of every fetch so far.
    pub fn min_ids(&self) -> Vec<u64> {
        self.min_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self, _channel: &str, min_id: u64) -> Result<Vec<FeedMessage>, FetchError> {
        self.min_ids.lock().unwrap().push(min_id);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                self.done.cancel();
                Ok(Vec::new())
            }
        }
    }
}

/// Always returns the same batch and counts calls per channel.
pub struct StaticFeed {
    batch: Vec<FeedMessage>,
    channels: Mutex<Vec<String>>,
}

impl StaticFeed {
    pub fn new(batch: Vec<FeedMessage>) -> Self {
        Self {
            batch,
            channels: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn calls_for(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == channel)
            .count()
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, channel: &str, min_id: u64) -> Result<Vec<FeedMessage>, FetchError> {
        self.channels.lock().unwrap().push(channel.to_string());
        Ok(self
            .batch
            .iter()
            .filter(|m| m.id > min_id)
            .cloned()
            .collect())
    }
}

/// Callback that records every delivered text synchronously.
pub fn recorder() -> (MessageCallback, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: MessageCallback =
        Arc::new(move |text: String, _timestamp: Option<NaiveDateTime>| {
            sink.lock().unwrap().push(text);
            async {}.boxed()
        });
    (callback, seen)
}

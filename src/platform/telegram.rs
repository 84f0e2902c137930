use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::extract::extract_messages;
use super::{FeedMessage, FeedSource};
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://t.me";

/// Reads the public web preview of a Telegram channel (`/s/{channel}`).
///
/// No bot token is involved: only channels with a public preview page work.
#[derive(Debug, Clone)]
pub struct TelegramFeed {
    client: Client,
    base_url: String,
}

impl TelegramFeed {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn channel_url(&self, channel: &str) -> String {
        format!("{}/s/{}", self.base_url.trim_end_matches('/'), channel)
    }
}

#[async_trait]
impl FeedSource for TelegramFeed {
    async fn fetch(&self, channel: &str, min_id: u64) -> Result<Vec<FeedMessage>, FetchError> {
        let url = self.channel_url(channel);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status { url, status });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.clone(),
            source,
        })?;

        let messages = extract_messages(channel, &body, min_id);
        debug!(
            "Fetched {} message(s) newer than {} from {}",
            messages.len(),
            min_id,
            url
        );
        Ok(messages)
    }
}

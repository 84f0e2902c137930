pub mod extract;
pub mod telegram;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::FetchError;

/// A message scraped from a public channel page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    /// Post number inside the channel, increasing over time
    pub id: u64,
    /// Display text, with line breaks preserved
    pub text: String,
    /// Post time as shown on the page, without the zone offset
    pub timestamp: Option<NaiveDateTime>,
}

/// Anything that can list the recent messages of a channel.
///
/// Implementations return only messages with `id > min_id`, in page order.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, channel: &str, min_id: u64) -> Result<Vec<FeedMessage>, FetchError>;
}

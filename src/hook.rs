//! Entry points that wire the poller to a filter and a delivery target.
//!
//! All of them validate their setup first and return a [`ConfigError`]
//! before polling starts. Once polling, they only return when `cancel` fires.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::ConfigError;
use crate::filter::Filter;
use crate::platform::FeedSource;
use crate::poller::{MessageCallback, WatermarkPoller};
use crate::webhook::WebhookClient;

/// Everything a webhook run needs besides the channel.
#[derive(Debug, Clone)]
pub struct HookOptions {
    pub url: String,
    pub method: String,
    /// Request body template, `$1`.. are replaced with the filter's groups
    pub data: String,
    pub filter: String,
    pub headers: HeaderMap,
    pub auth_user: String,
    pub auth_pass: String,
    pub upper: bool,
    pub trim: bool,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            data: String::new(),
            filter: String::new(),
            headers: HeaderMap::new(),
            auth_user: String::new(),
            auth_pass: String::new(),
            upper: false,
            trim: false,
        }
    }
}

impl HookOptions {
    pub fn build_filter(&self) -> Result<Filter, ConfigError> {
        Filter::new(&self.filter, self.data.clone(), self.upper, self.trim)
    }

    pub fn build_webhook(&self, client: Client) -> Result<WebhookClient, ConfigError> {
        Ok(WebhookClient::new(client, &self.url, &self.method)?
            .with_headers(self.headers.clone())
            .with_basic_auth(&self.auth_user, &self.auth_pass))
    }
}

/// Deliver the raw text of every new message of `channel`.
pub async fn run(
    source: &dyn FeedSource,
    channel: &str,
    wait: Duration,
    cancel: &CancellationToken,
    on_message: MessageCallback,
) -> Result<(), ConfigError> {
    if channel.is_empty() {
        return Err(ConfigError::MissingParameter("channel"));
    }
    WatermarkPoller::new()
        .run(source, channel, wait, cancel, on_message)
        .await;
    Ok(())
}

/// Deliver the rendered template of every new message matching `filter`.
pub async fn run_with_filter(
    source: &dyn FeedSource,
    channel: &str,
    wait: Duration,
    cancel: &CancellationToken,
    filter: Filter,
    on_payload: MessageCallback,
) -> Result<(), ConfigError> {
    let on_message: MessageCallback =
        Arc::new(move |text: String, timestamp: Option<NaiveDateTime>| {
            match filter.apply(&text) {
                Some(payload) => on_payload(payload, timestamp),
                None => {
                    debug!("Message doesn't match {}", filter.pattern());
                    async {}.boxed()
                }
            }
        });
    run(source, channel, wait, cancel, on_message).await
}

/// Call the configured webhook for every new message matching the filter.
pub async fn run_with_hook(
    source: &dyn FeedSource,
    client: Client,
    channel: &str,
    wait: Duration,
    cancel: &CancellationToken,
    options: &HookOptions,
) -> Result<(), ConfigError> {
    let filter = options.build_filter()?;
    let webhook = Arc::new(options.build_webhook(client)?);
    run_with_filter(
        source,
        channel,
        wait,
        cancel,
        filter,
        webhook_callback(webhook),
    )
    .await
}

/// Callback that sends each payload to `webhook`, logging the outcome.
pub fn webhook_callback(webhook: Arc<WebhookClient>) -> MessageCallback {
    Arc::new(move |payload: String, timestamp: Option<NaiveDateTime>| {
        let webhook = webhook.clone();
        async move {
            match webhook.deliver(&payload).await {
                Ok(()) => info!("WEBHOOK {} {:?} {}", webhook.url(), timestamp, payload),
                Err(e) => error!("{}", e),
            }
        }
        .boxed()
    })
}

/// Callback that prints each payload to stdout.
pub fn stdout_callback() -> MessageCallback {
    writer_callback(tokio::io::stdout())
}

/// Callback that writes one line per payload to `out`, prefixed with the
/// message timestamp when there is one.
///
/// The write happens in the returned future, so a stalled writer holds up
/// later lines but never the poll loop.
pub fn writer_callback<W>(out: W) -> MessageCallback
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let out = Arc::new(Mutex::new(out));
    Arc::new(move |payload: String, timestamp: Option<NaiveDateTime>| {
        let out = out.clone();
        async move {
            let line = match timestamp {
                Some(ts) => format!("{}\t{}\n", ts, payload),
                None => format!("{}\n", payload),
            };
            let mut out = out.lock().await;
            if let Err(e) = out.write_all(line.as_bytes()).await {
                error!("Couldn't print payload: {}", e);
                return;
            }
            if let Err(e) = out.flush().await {
                error!("Couldn't flush output: {}", e);
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{message, recorder, ScriptedFeed};
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_filtered_run_renders_only_new_matches() {
        let done = CancellationToken::new();
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![message(1, "hello A"), message(2, "hello B")]),
                Ok(vec![message(3, "hello C")]),
                Ok(vec![message(4, "bye D"), message(5, "hello E")]),
            ],
            done.clone(),
        );
        let filter = Filter::new(r"hello (\w+)", "got:$1", false, false).unwrap();
        let (callback, seen) = recorder();

        run_with_filter(&feed, "test", TICK, &done, filter, callback)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["got:C".to_string(), "got:E".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_channel_is_rejected() {
        let done = CancellationToken::new();
        let feed = ScriptedFeed::new(vec![], done.clone());
        let (callback, _seen) = recorder();

        let err = run(&feed, "", TICK, &done, callback).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("channel")));
    }

    #[tokio::test]
    async fn test_bad_filter_fails_before_polling() {
        let done = CancellationToken::new();
        let feed = ScriptedFeed::new(vec![Ok(vec![message(1, "x")])], done.clone());
        let options = HookOptions {
            url: "http://localhost/hook".to_string(),
            filter: "([".to_string(),
            ..HookOptions::default()
        };

        let err = run_with_hook(&feed, Client::new(), "test", TICK, &done, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(feed.min_ids().is_empty());
    }

    #[tokio::test]
    async fn test_hook_posts_rendered_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_string("ticker=ABC"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let done = CancellationToken::new();
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![message(10, "buy xyz")]),
                Ok(vec![message(11, "buy abc "), message(12, "sell qqq")]),
            ],
            done.clone(),
        );
        let options = HookOptions {
            url: format!("{}/notify", server.uri()),
            method: "POST".to_string(),
            data: "ticker=$1".to_string(),
            filter: r"buy (\w+)".to_string(),
            upper: true,
            trim: true,
            ..HookOptions::default()
        };

        run_with_hook(&feed, Client::new(), "test", TICK, &done, &options)
            .await
            .unwrap();

        // Deliveries are spawned; give the request time to land.
        for _ in 0..100 {
            let received = server.received_requests().await.unwrap_or_default();
            if !received.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_stalled_writer_does_not_block_polling() {
        // Nobody reads `output` until polling is over, so the first write stalls.
        let (writer, mut output) = tokio::io::duplex(4);
        let done = CancellationToken::new();
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![message(1, "hello A")]),
                Ok(vec![message(2, "hello B")]),
                Ok(vec![message(3, "hello C")]),
                Ok(vec![]),
                Ok(vec![]),
            ],
            done.clone(),
        );
        let filter = Filter::new(r"hello (\w+)", "got:$1", false, false).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_with_filter(&feed, "test", TICK, &done, filter, writer_callback(writer)),
        )
        .await
        .expect("poll loop waited on the output")
        .unwrap();

        assert_eq!(feed.min_ids(), vec![0, 1, 2, 3, 3, 3]);

        let expected = "got:B\ngot:C\n";
        let mut printed = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(5), output.read_exact(&mut printed))
            .await
            .expect("payloads were never written")
            .unwrap();
        let mut lines: Vec<&str> = std::str::from_utf8(&printed).unwrap().lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["got:B", "got:C"]);
    }
}

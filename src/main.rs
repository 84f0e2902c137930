use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use tracing::info;

use tghook::config::HttpConfig;
use tghook::filter::Filter;
use tghook::hook::{self, HookOptions};
use tghook::platform::telegram::{TelegramFeed, DEFAULT_BASE_URL};
use tghook::poller::MessageCallback;
use tghook::webhook::parse_header;

/// Trigger a webhook when a public telegram channel posts a matching message.
///
/// Without --url, matches are printed to stdout instead.
#[derive(Parser, Debug)]
#[command(name = "tghook", version)]
struct Args {
    /// Telegram channel to get messages from
    #[arg(long, env = "TGHOOK_CHANNEL")]
    channel: String,

    /// Regex filter to search
    #[arg(long)]
    filter: Option<String>,

    /// Webhook url
    #[arg(long)]
    url: Option<String>,

    /// Webhook http method (GET, POST...)
    #[arg(long, default_value = "GET")]
    method: String,

    /// Webhook post data, $1, $2... are replaced with the filter groups
    #[arg(long, default_value = "")]
    data: String,

    /// Basic auth user
    #[arg(long, default_value = "")]
    auth_user: String,

    /// Basic auth pass
    #[arg(long, env = "TGHOOK_AUTH_PASS", default_value = "")]
    auth_pass: String,

    /// Convert filtered data to upper case
    #[arg(long)]
    upper: bool,

    /// Trim spaces of filtered data
    #[arg(long)]
    trim: bool,

    /// Wait time between requests, in milliseconds
    #[arg(long, default_value_t = 500)]
    wait: u64,

    /// Http header with format header:value (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Base url of the channel preview pages
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    feed_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tghook::init_tracing();

    let args = Args::parse();

    let mut headers = HeaderMap::new();
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        headers.append(name, value);
    }

    let http = HttpConfig {
        feed_base_url: args.feed_url.clone(),
        ..HttpConfig::default()
    };
    let client = http.build_client()?;
    let feed = TelegramFeed::new(client.clone(), http.feed_base_url.clone());
    let cancel = tghook::shutdown_token();
    let wait = Duration::from_millis(args.wait);

    info!("Watching channel {}", args.channel);

    let result = match (&args.url, &args.filter) {
        (Some(url), filter) => {
            let options = HookOptions {
                url: url.clone(),
                method: args.method.clone(),
                data: args.data.clone(),
                filter: filter.clone().unwrap_or_default(),
                headers,
                auth_user: args.auth_user.clone(),
                auth_pass: args.auth_pass.clone(),
                upper: args.upper,
                trim: args.trim,
            };
            hook::run_with_hook(&feed, client, &args.channel, wait, &cancel, &options).await
        }
        (None, Some(pattern)) if !args.data.is_empty() => {
            let filter = Filter::new(pattern, args.data.clone(), args.upper, args.trim)?;
            hook::run_with_filter(
                &feed,
                &args.channel,
                wait,
                &cancel,
                filter,
                hook::stdout_callback(),
            )
            .await
        }
        (None, Some(pattern)) => {
            // No template: print the whole matching message
            let filter = Filter::new(pattern, "", false, false)?;
            let print = hook::stdout_callback();
            let on_message: MessageCallback =
                Arc::new(move |text: String, timestamp: Option<NaiveDateTime>| {
                    if filter.is_match(&text) {
                        print(text, timestamp)
                    } else {
                        async {}.boxed()
                    }
                });
            hook::run(&feed, &args.channel, wait, &cancel, on_message).await
        }
        (None, None) => {
            hook::run(&feed, &args.channel, wait, &cancel, hook::stdout_callback()).await
        }
    };
    result.with_context(|| format!("tghook for channel {} failed", args.channel))?;

    Ok(())
}

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::warn;

use super::FeedMessage;

static MESSAGE_WRAP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".tgme_widget_message_wrap").expect("static selector"));
static MESSAGE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".tgme_widget_message_text").expect("static selector"));
static MESSAGE_TIME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".tgme_widget_message_info time").expect("static selector")
});
static MESSAGE_POST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".tgme_widget_message").expect("static selector"));

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Extract the messages of a `t.me/s/{channel}` page that are newer than `min_id`.
///
/// Posts without a parseable `data-post` id are skipped; the rest of the page
/// is still returned. A missing or malformed timestamp leaves `timestamp` empty.
pub fn extract_messages(channel: &str, html: &str, min_id: u64) -> Vec<FeedMessage> {
    let doc = Html::parse_document(html);
    let mut messages = Vec::new();

    for wrap in doc.select(&MESSAGE_WRAP) {
        let id = wrap
            .select(&MESSAGE_POST)
            .filter_map(|el| el.value().attr("data-post"))
            .find_map(|post| parse_post_id(channel, post));
        let Some(id) = id else {
            warn!("Skipping message without post id in channel {}", channel);
            continue;
        };
        if id <= min_id {
            continue;
        }

        let text = wrap
            .select(&MESSAGE_TEXT)
            .next()
            .map(render_text)
            .unwrap_or_default();
        let timestamp = wrap
            .select(&MESSAGE_TIME)
            .filter_map(|el| el.value().attr("datetime"))
            .find_map(parse_timestamp);

        messages.push(FeedMessage {
            id,
            text,
            timestamp,
        });
    }

    messages
}

/// `data-post` looks like `{channel}/{id}`; the channel prefix is matched
/// case-insensitively. Posts of any other channel are rejected.
fn parse_post_id(channel: &str, post: &str) -> Option<u64> {
    let raw = match post.split_once('/') {
        Some((prefix, id)) if prefix.eq_ignore_ascii_case(channel) => id,
        Some(_) => {
            warn!("Post {} doesn't belong to channel {}", post, channel);
            return None;
        }
        None => post,
    };
    match raw.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Couldn't parse post id {}: {}", raw, e);
            None
        }
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let local = value.split_once('+').map_or(value, |(local, _)| local);
    match NaiveDateTime::parse_from_str(local, TIMESTAMP_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!("Couldn't parse timestamp {}: {}", local, e);
            None
        }
    }
}

fn render_text(el: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text
}

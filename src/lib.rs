//! Watch public Telegram channels and fire webhooks for new messages.
//!
//! [`hook`] runs a single channel until cancelled, [`scheduler`] runs many of
//! them on cron schedules with a time budget per run.

pub mod config;
pub mod error;
pub mod filter;
pub mod hook;
pub mod platform;
pub mod poller;
pub mod scheduler;
pub mod webhook;

#[cfg(test)]
mod test_utils;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the fmt subscriber used by both binaries.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tghook=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Root token cancelled on Ctrl-C.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
    token
}

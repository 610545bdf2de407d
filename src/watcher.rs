//! Block watcher.
//!
//! A single long-lived task subscribes to `newHeads` over websocket and
//! zeroes the ledger's block gas accumulator on every head, reopening the
//! admission window for the next block. Subscription failures are fatal to
//! the task only: request handlers keep serving against the stale counter
//! until the process is restarted.

use alloy_provider::{Provider, ProviderBuilder, WsConnect};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::ledger::Ledger;

/// Runs until the subscription dies or `shutdown` is cancelled.
pub async fn watch_heads(ws_url: Url, ledger: Arc<Ledger>, shutdown: CancellationToken) {
    let provider = match ProviderBuilder::new().connect_ws(WsConnect::new(ws_url.as_str())).await {
        Ok(provider) => provider,
        Err(err) => {
            tracing::error!(%ws_url, %err, "websocket connection failed");
            return;
        }
    };
    let subscription = match provider.subscribe_blocks().await {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::error!(%err, "newHeads subscription failed");
            return;
        }
    };
    tracing::info!(%ws_url, "watching new heads");

    let mut heads = subscription.into_stream();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("quit signal received, exiting block watcher");
                return;
            }
            head = heads.next() => match head {
                Some(header) => {
                    tracing::info!(number = header.number, hash = %header.hash, "new block generated");
                    ledger.reset_block_gas().await;
                }
                None => {
                    tracing::error!("newHeads subscription closed");
                    return;
                }
            }
        }
    }
}

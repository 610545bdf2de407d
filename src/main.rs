//! Relay-signer HTTP entrypoint.
//!
//! This binary launches an Axum-based JSON-RPC server that relays signed
//! client transactions to a permissioned node as RelayHub meta-transactions.
//!
//! Endpoints:
//! - `GET /` – liveness probe
//! - `POST /` – JSON-RPC 2.0: `eth_sendRawTransaction`,
//!   `eth_getTransactionCount`, `eth_getTransactionReceipt`
//!
//! Startup sequence:
//! - `.env` values loaded
//! - tracing (and optional OTLP export) initialized
//! - configuration read from the JSON file named by `--config` / `$CONFIG`
//! - node signing key read from `WRITER_KEY`
//! - RelayHub address resolved through its proxy contract
//! - block watcher subscribed to `newHeads` over websocket
//!
//! Environment:
//! - `WRITER_KEY` — `0x`-prefixed hex; characters 2..66 are the node key
//! - `HOST`, `PORT` — binding address fallbacks
//! - `OTEL_*` — enable OTLP span export

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;

use relay_signer::chain::{self, HttpChainClient};
use relay_signer::config::{Config, InitError, NodeContext, WriterKey};
use relay_signer::handlers;
use relay_signer::ledger::Ledger;
use relay_signer::relayer_local::RelaySigner;
use relay_signer::util::{SigDown, Telemetry};
use relay_signer::watcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    let telemetry = Telemetry::init();

    let config = Config::load()?;

    let signer = WriterKey::from_env()
        .and_then(|key| key.signer())
        .inspect_err(|err| tracing::error!(code = err.code(), "{err}"))?;
    let chain_client = HttpChainClient::new(config.application.node_url.clone(), signer);

    // Purely local validation comes before any network round-trip.
    let permissions = config
        .security
        .permission_contract()
        .inspect_err(|err| tracing::error!(code = err.code(), "{err}"))?;

    let relay_hub =
        chain::resolve_relay_hub(&config.application.node_url, config.application.contract_address)
            .await
            .map_err(InitError::RelayHubResolution)
            .inspect_err(|err| tracing::error!(code = err.code(), "{err}"))?;
    let context = NodeContext {
        address: chain_client.node_address(),
        relay_hub,
        permissions,
        deploy_meta_tx: config.application.deploy_meta_tx,
    };
    tracing::info!(node = %context.address, %relay_hub, "relay signer initialized");

    let ledger = Arc::new(Ledger::new());
    let relay_signer = RelaySigner::new(context, chain_client, ledger.clone());

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();
    let watcher_task = tokio::spawn(watcher::watch_heads(
        config.application.ws_url.clone(),
        ledger,
        shutdown.clone(),
    ));

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(Arc::new(relay_signer)))
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let graceful_shutdown = {
        let token = shutdown.clone();
        async move { token.cancelled().await }
    };
    axum::serve(listener, http_endpoints).with_graceful_shutdown(graceful_shutdown).await?;

    shutdown.cancel();
    let _ = watcher_task.await;

    Ok(())
}

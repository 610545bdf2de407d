//! Gas-relay signer gateway for permissioned EVM networks.
//!
//! This crate implements a JSON-RPC intermediary that accepts signed
//! transactions from permissionless clients and re-submits them to a
//! permissioned node as *meta-transactions*: the original signature travels
//! untouched inside a `RelayHub.relayMetaTx` call paid for by the node's own
//! signing account, so the external client never needs chain-native funds.
//! The on-chain RelayHub recovers the original signer from the forwarded
//! payload and bills gas against the relaying node's per-block allowance.
//!
//! # Overview
//!
//! Three JSON-RPC methods are served, all on `POST /`:
//!
//! - `eth_sendRawTransaction` — decode the EIP-155 transaction, check sender
//!   permission, account the wrapper gas against the node allowance, and
//!   submit the RelayHub call.
//! - `eth_getTransactionCount` — answer `pending` from the in-memory nonce
//!   ledger, `latest` from `RelayHub.getNonce`.
//! - `eth_getTransactionReceipt` — fetch the raw receipt and surface
//!   deployed-contract addresses and revert reasons hidden inside RelayHub
//!   event logs.
//!
//! # Modules
//!
//! - [`codec`] — legacy transaction decoding and canonical signing-payload RLP.
//! - [`chain`] — typed JSON-RPC access to the node and the RelayHub contract.
//! - [`ledger`] — per-block gas accounting and per-sender pending nonces.
//! - [`receipt`] — RelayHub event interpretation over raw receipts.
//! - [`relayer`] — the [`Relayer`](relayer::Relayer) trait and error taxonomy.
//! - [`relayer_local`] — the relay pipeline implementation.
//! - [`watcher`] — the `newHeads` subscription that resets gas accounting.
//! - [`handlers`] — the JSON-RPC 2.0 envelope and axum routes.
//! - [`config`] — configuration file, signing key, and startup context.
//! - [`util`] — shutdown signals and telemetry bootstrap.

pub mod chain;
pub mod codec;
pub mod config;
pub mod handlers;
pub mod ledger;
pub mod receipt;
pub mod relayer;
pub mod relayer_local;
pub mod util;
pub mod watcher;

//! Relay pipeline.
//!
//! [`RelaySigner`] is the gateway's [`Relayer`] implementation. A relay
//! request moves through a fixed sequence: decode the raw transaction,
//! consult the permission gate, admit the wrapper gas against the node
//! allowance, submit the RelayHub call, and finally bump the sender's
//! pending nonce. Any failure short-circuits; the admitted gas is never
//! rolled back — the next head resets the accumulator.

use alloy_primitives::{Address, B256, U256};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::chain::{ChainClient, HttpChainClient, MetaTx};
use crate::codec::{self, IncomingTx};
use crate::config::NodeContext;
use crate::ledger::{Admission, Ledger};
use crate::receipt;
use crate::relayer::{NonceTag, RelayError, Relayer};

/// Gas reserved for RelayHub's own bookkeeping around the inner call.
const WRAPPER_GAS_BASE: u64 = 300_000;
/// Surcharge per byte of inner calldata carried through the hub.
const WRAPPER_GAS_PER_BYTE: u64 = 105;

/// Outer gas limit for a meta-transaction wrapping `data_len` bytes of
/// calldata and an inner limit of `inner_gas`.
pub fn wrapper_gas(data_len: usize, inner_gas: u64) -> u64 {
    (data_len as u64) * WRAPPER_GAS_PER_BYTE + WRAPPER_GAS_BASE + inner_gas
}

/// The relay pipeline, generic over its chain adapter so tests can inject
/// a scripted chain.
pub struct RelaySigner<C = HttpChainClient> {
    context: NodeContext,
    chain: C,
    ledger: Arc<Ledger>,
}

impl<C: ChainClient> RelaySigner<C> {
    pub fn new(context: NodeContext, chain: C, ledger: Arc<Ledger>) -> Self {
        Self { context, chain, ledger }
    }

    /// Permission gate: a no-op when permissioning is disabled, otherwise a
    /// call to the account contract.
    async fn verify_sender(&self, sender: Address) -> Result<(), RelayError> {
        let Some(ingress) = self.context.permissions else {
            return Ok(());
        };
        let permitted = self.chain.account_permitted(ingress, sender).await?;
        tracing::info!(%sender, permitted, "sender permission checked");
        if permitted { Ok(()) } else { Err(RelayError::NotPermitted) }
    }
}

impl<C: ChainClient> Relayer for RelaySigner<C> {
    type Error = RelayError;

    #[instrument(skip_all, err)]
    async fn relay(&self, raw_tx: &str) -> Result<B256, RelayError> {
        let tx = codec::decode(raw_tx)?;
        log_incoming(&tx);
        self.verify_sender(tx.sender).await?;

        let outer_gas = wrapper_gas(tx.data.len(), tx.gas);
        let relay_hub = self.context.relay_hub;
        let chain = &self.chain;
        let admission = self.ledger.admit(outer_gas, || chain.node_gas_limit(relay_hub)).await?;
        if admission == Admission::Rejected {
            return Err(RelayError::GasLimitExceeded);
        }

        let call = MetaTx {
            signing_data: tx.signing_payload(),
            v: tx.v as u8,
            r: B256::from(tx.r.to_be_bytes::<32>()),
            s: B256::from(tx.s.to_be_bytes::<32>()),
            gas_limit: outer_gas,
            deploy: tx.to.is_none() && self.context.deploy_meta_tx,
        };
        let hash = self.chain.send_meta_tx(relay_hub, call).await?;
        tracing::info!(%hash, "meta-transaction submitted");
        self.ledger.mark_submitted(tx.sender, tx.nonce).await;
        Ok(hash)
    }

    #[instrument(skip_all, err)]
    async fn transaction_count(&self, sender: Address, tag: NonceTag) -> Result<U256, RelayError> {
        if tag == NonceTag::Pending {
            if let Some(nonce) = self.ledger.pending_nonce(sender).await {
                return Ok(U256::from(nonce));
            }
        }
        Ok(self.chain.relay_nonce(self.context.relay_hub, sender).await?)
    }

    #[instrument(skip_all, err)]
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Value>, RelayError> {
        let raw = self.chain.transaction_receipt(hash).await?;
        Ok(raw.map(receipt::interpret))
    }
}

fn log_incoming(tx: &IncomingTx) {
    tracing::info!(
        from = %tx.sender,
        to = ?tx.to,
        nonce = tx.nonce,
        gas = tx.gas,
        gas_price = %tx.gas_price,
        value = %tx.value,
        data = %tx.data,
        "decoded raw transaction"
    );
}

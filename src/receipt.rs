//! RelayHub receipt interpretation.
//!
//! The node reports the outer RelayHub transaction, so a plain receipt never
//! shows what happened to the inner call: deployments surface no contract
//! address and reverts still read `status: 0x1`. This module rewrites a raw
//! receipt from its RelayHub event logs:
//!
//! - `ContractDeployed` — the deployed address replaces `contractAddress`.
//! - `TransactionRelayed` with `executed == false` — `status` becomes `0x0`
//!   and the inner revert data is exposed as `revertReason` (typically
//!   `Error(string)`-encoded, `0x08c379a0…`).
//! - `BadTransactionSent` — compiled only with the `bad-transaction-events`
//!   feature; translates the hub's error code to a fixed reason string.
//!
//! The receipt stays an untyped JSON map throughout, so unknown node fields
//! pass through untouched, and a second interpretation of an already
//! rewritten receipt yields the same result.

use alloy_primitives::{Address, B256, Bytes, hex};
use alloy_sol_types::{SolEvent, SolValue};
use serde_json::{Value, json};
use std::str::FromStr;

use crate::chain::RelayHub;

/// Rewrites `contractAddress`, `status`, and `revertReason` from the
/// RelayHub event logs carried in `receipt`.
pub fn interpret(mut receipt: Value) -> Value {
    let Some(logs) = receipt.get("logs").and_then(Value::as_array).cloned() else {
        return receipt;
    };
    for log in &logs {
        let topic = log
            .get("topics")
            .and_then(|topics| topics.get(0))
            .and_then(Value::as_str)
            .and_then(|topic| B256::from_str(topic).ok());
        let Some(topic) = topic else { continue };
        let data = log.get("data").and_then(Value::as_str).and_then(|data| hex::decode(data).ok());
        let Some(data) = data else { continue };

        if topic == RelayHub::ContractDeployed::SIGNATURE_HASH {
            if data.len() >= Address::len_bytes() {
                let deployed = Address::from_slice(&data[data.len() - Address::len_bytes()..]);
                receipt["contractAddress"] = json!(deployed);
            }
        } else if topic == RelayHub::TransactionRelayed::SIGNATURE_HASH {
            // relay/from/to are indexed; the data section carries only
            // (executed, output).
            let Ok((executed, output)) = <(bool, Bytes)>::abi_decode_params(&data) else {
                tracing::warn!("skipping TransactionRelayed log with undecodable data");
                continue;
            };
            if !executed {
                receipt["status"] = json!("0x0");
                receipt["revertReason"] = json!(format!("0x{}", hex::encode(&output)));
            }
        }

        #[cfg(feature = "bad-transaction-events")]
        if topic == RelayHub::BadTransactionSent::SIGNATURE_HASH {
            let Ok((_node, _original_sender, error_code)) =
                <(Address, Address, u8)>::abi_decode_params(&data)
            else {
                tracing::warn!("skipping BadTransactionSent log with undecodable data");
                continue;
            };
            let reason = bad_transaction_reason(error_code).map(str::as_bytes).unwrap_or_default();
            receipt["status"] = json!("0x0");
            receipt["revertReason"] = json!(format!("0x{}", hex::encode(reason)));
        }
    }
    receipt
}

/// Fixed reason strings for the RelayHub `BadTransactionSent` error codes.
#[cfg(feature = "bad-transaction-events")]
fn bad_transaction_reason(code: u8) -> Option<&'static str> {
    match code {
        0 => Some("Max block gas limit overpassed"),
        1 => Some("Original sender is different who signed the transaction"),
        2 => Some("Bad nonce assigned"),
        3 => Some("Not enough gas to process the transaction"),
        4 => Some("Destination is an empty contract"),
        5 => Some("Your bytecode to deploy is empty"),
        6 => Some("Invalid Signature"),
        7 => Some("Destination is not allowed"),
        _ => None,
    }
}

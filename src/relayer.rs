//! Relay gateway interface.
//!
//! [`Relayer`] is the seam between the JSON-RPC front door and the relay
//! pipeline: one method per served JSON-RPC method. The trait keeps the
//! handlers testable against stubs and lets the pipeline implementation
//! stay generic over its chain adapter.

use alloy_primitives::{Address, B256, U256};
use serde_json::Value;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::chain::ChainError;
use crate::codec::CodecError;

/// Block tag accepted by `eth_getTransactionCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceTag {
    /// Answer from the in-memory ledger when it has seen the sender.
    Pending,
    /// Always read `RelayHub.getNonce` on-chain.
    Latest,
}

impl NonceTag {
    /// Parses the optional tag parameter, case-insensitively. An absent tag
    /// means `latest`.
    pub fn parse(tag: Option<&str>) -> Result<Self, RelayError> {
        match tag {
            None => Ok(NonceTag::Latest),
            Some(tag) if tag.eq_ignore_ascii_case("pending") => Ok(NonceTag::Pending),
            Some(tag) if tag.eq_ignore_ascii_case("latest") => Ok(NonceTag::Latest),
            Some(_) => Err(RelayError::InvalidTag),
        }
    }
}

/// Everything that can go wrong while serving a relay request. The message
/// of each variant is exactly what the JSON-RPC client sees.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The raw transaction hex/RLP did not parse.
    #[error("{0}")]
    BadEncoding(String),
    /// Signature components absent, out of range, or unrecoverable.
    #[error("bad signature ECDSA")]
    BadSignature,
    /// The permissioning contract rejected the originator.
    #[error("account sender is not permitted to send transactions")]
    NotPermitted,
    /// Admission would overrun the node's per-block allowance.
    #[error("transaction gas limit exceeds block gas limit")]
    GasLimitExceeded,
    /// `eth_getTransactionCount` received an unsupported block tag.
    #[error("parameter not defined, only pending or latest are allowed")]
    InvalidTag,
    /// Upstream chain failure, surfaced with its original text.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Request envelope or parameter shape failure.
    #[error("internal error")]
    Internal,
}

impl From<CodecError> for RelayError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MissingSignature | CodecError::Recovery(_) => RelayError::BadSignature,
            other => RelayError::BadEncoding(other.to_string()),
        }
    }
}

/// Asynchronous interface of the relay gateway.
pub trait Relayer {
    /// The error type surfaced to the JSON-RPC layer.
    type Error: Debug + Display;

    /// Relays a raw signed transaction and returns the outer transaction
    /// hash (`eth_sendRawTransaction`).
    fn relay(&self, raw_tx: &str) -> impl Future<Output = Result<B256, Self::Error>> + Send;

    /// Answers `eth_getTransactionCount` for `sender` under `tag`.
    fn transaction_count(
        &self,
        sender: Address,
        tag: NonceTag,
    ) -> impl Future<Output = Result<U256, Self::Error>> + Send;

    /// Answers `eth_getTransactionReceipt`; `None` when the node does not
    /// know the hash.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;
}

impl<T: Relayer> Relayer for Arc<T> {
    type Error = T::Error;

    fn relay(&self, raw_tx: &str) -> impl Future<Output = Result<B256, Self::Error>> + Send {
        self.as_ref().relay(raw_tx)
    }

    fn transaction_count(
        &self,
        sender: Address,
        tag: NonceTag,
    ) -> impl Future<Output = Result<U256, Self::Error>> + Send {
        self.as_ref().transaction_count(sender, tag)
    }

    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send {
        self.as_ref().transaction_receipt(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parsing_is_case_insensitive() {
        assert_eq!(NonceTag::parse(Some("pending")).unwrap(), NonceTag::Pending);
        assert_eq!(NonceTag::parse(Some("PENDING")).unwrap(), NonceTag::Pending);
        assert_eq!(NonceTag::parse(Some("Latest")).unwrap(), NonceTag::Latest);
        assert_eq!(NonceTag::parse(None).unwrap(), NonceTag::Latest);
    }

    #[test]
    fn unknown_tag_is_rejected_with_the_exact_message() {
        let err = NonceTag::parse(Some("earliest")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter not defined, only pending or latest are allowed"
        );
    }

    #[test]
    fn codec_errors_map_to_the_taxonomy() {
        let bad_signature: RelayError = CodecError::MissingSignature.into();
        assert!(matches!(bad_signature, RelayError::BadSignature));

        let bad_encoding: RelayError = CodecError::Rlp(alloy_rlp::Error::InputTooShort).into();
        assert!(matches!(bad_encoding, RelayError::BadEncoding(_)));
    }
}

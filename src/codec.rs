//! Legacy transaction codec.
//!
//! Incoming transactions arrive as hex-encoded EIP-155 legacy RLP: the
//! nine-field list `[nonce, gasPrice, gas, to, value, data, v, r, s]`.
//! [`decode`] parses that list, classifies malformed signatures, and recovers
//! the originating address. [`IncomingTx::signing_payload`] re-encodes the
//! six unsigned fields — the exact bytes the RelayHub contract hashes to
//! recover the originator on-chain, with `to` as an empty byte string for
//! contract creation.

use alloy_primitives::{Address, B256, Bytes, Signature, SignatureError, TxKind, U256, keccak256};
use alloy_rlp::{Decodable, Encodable, Header};

/// Failure to interpret a raw transaction blob.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The blob is not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] alloy_primitives::hex::FromHexError),
    /// The blob is not a well-formed legacy transaction list.
    #[error("invalid transaction encoding: {0}")]
    Rlp(#[from] alloy_rlp::Error),
    /// One of `v`, `r`, `s` is absent or outside its legal range.
    #[error("bad signature ECDSA")]
    MissingSignature,
    /// The signature does not recover to any address.
    #[error("bad signature ECDSA")]
    Recovery(#[from] SignatureError),
}

/// A decoded client transaction, immutable once parsed.
///
/// `v`, `r`, `s` are kept exactly as transmitted; they are forwarded to the
/// RelayHub bit-for-bit, without re-normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingTx {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    /// Originator, recovered from the signature at decode time.
    pub sender: Address,
}

impl IncomingTx {
    /// Chain id derivable from `v` per EIP-155; `None` for the pre-EIP-155
    /// values 27 and 28.
    pub fn chain_id(&self) -> Option<u64> {
        match self.v {
            27 | 28 => None,
            v if v >= 35 => Some((v - 35) / 2),
            _ => None,
        }
    }

    /// Canonical RLP over the six unsigned fields.
    ///
    /// This is the `signingData` argument of the RelayHub meta-transaction
    /// entry points. A missing `to` encodes as an empty byte string.
    pub fn signing_payload(&self) -> Bytes {
        let payload_length = self.fields_len();
        let mut out = Vec::with_capacity(payload_length + 3);
        Header { list: true, payload_length }.encode(&mut out);
        self.encode_fields(&mut out);
        out.into()
    }

    /// Hash the originator actually signed: the six fields alone for
    /// unprotected transactions, with the `[chain_id, 0, 0]` trailer when
    /// `v` carries a chain id.
    pub fn signing_hash(&self) -> B256 {
        match self.chain_id() {
            None => keccak256(self.signing_payload()),
            Some(chain_id) => {
                let payload_length =
                    self.fields_len() + chain_id.length() + 0u8.length() + 0u8.length();
                let mut out = Vec::with_capacity(payload_length + 3);
                Header { list: true, payload_length }.encode(&mut out);
                self.encode_fields(&mut out);
                chain_id.encode(&mut out);
                0u8.encode(&mut out);
                0u8.encode(&mut out);
                keccak256(&out)
            }
        }
    }

    fn fields_len(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas.length()
            + TxKind::from(self.to).length()
            + self.value.length()
            + self.data.length()
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas.encode(out);
        TxKind::from(self.to).encode(out);
        self.value.encode(out);
        self.data.encode(out);
    }
}

/// Decodes a hex-encoded signed legacy transaction and recovers its sender.
///
/// The `0x` prefix is optional. A list that stops after the unsigned fields,
/// a zero `r` or `s`, or a `v` outside `{27, 28} ∪ [35, ∞)` all classify as
/// [`CodecError::MissingSignature`]; other malformed input surfaces the raw
/// decoder message.
pub fn decode(raw_hex: &str) -> Result<IncomingTx, CodecError> {
    let raw = alloy_primitives::hex::decode(raw_hex)?;
    let mut buf = raw.as_slice();
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() != header.payload_length {
        return Err(alloy_rlp::Error::Custom("trailing bytes after transaction").into());
    }

    let nonce = u64::decode(&mut buf)?;
    let gas_price = U256::decode(&mut buf)?;
    let gas = u64::decode(&mut buf)?;
    let to = match TxKind::decode(&mut buf)? {
        TxKind::Create => None,
        TxKind::Call(address) => Some(address),
    };
    let value = U256::decode(&mut buf)?;
    let data = Bytes::decode(&mut buf)?;

    if buf.is_empty() {
        return Err(CodecError::MissingSignature);
    }
    let v = u64::decode(&mut buf)?;
    let r = U256::decode(&mut buf)?;
    let s = U256::decode(&mut buf)?;
    if !buf.is_empty() {
        return Err(alloy_rlp::Error::Custom("extra fields in transaction list").into());
    }
    if r.is_zero() || s.is_zero() {
        return Err(CodecError::MissingSignature);
    }
    let parity = match v {
        27 | 28 => v == 28,
        v if v >= 35 => (v - 35) % 2 == 1,
        _ => return Err(CodecError::MissingSignature),
    };

    let tx = IncomingTx {
        nonce,
        gas_price,
        gas,
        to,
        value,
        data,
        v,
        r,
        s,
        sender: Address::ZERO,
    };
    let signature = Signature::new(r, s, parity);
    let sender = signature.recover_address_from_prehash(&tx.signing_hash())?;
    Ok(IncomingTx { sender, ..tx })
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes, hex};
    use alloy_signer_local::PrivateKeySigner;

    /// A mainline signed transaction: nonce 1, 2M gas, a 36-byte calldata
    /// payload, unprotected v = 27.
    const RAW_TX: &str = "0xf8840180831e8480946e6bbf31aa45042d53128339383fcd1c377b42c780a46057361d00000000000000000000000000000000000000000000000000000000000001591ba028934b543809922b277e85f6bcf7b1f25e937de05c5138e17fdfa480ba74e84ba055a2a611763ffcb748547408093551928c9549f95a0a9cabd3b1f1f2e166cc16";

    const SIGNING_PAYLOAD: &str = "f8410180831e8480946e6bbf31aa45042d53128339383fcd1c377b42c780a46057361d0000000000000000000000000000000000000000000000000000000000000159";

    #[test]
    fn decodes_signed_transaction_fields() {
        let tx = decode(RAW_TX).expect("fixture decodes");
        assert_eq!(tx.nonce, 1);
        assert_eq!(tx.gas_price, U256::ZERO);
        assert_eq!(tx.gas, 2_000_000);
        assert_eq!(tx.to, Some(address!("6e6bbf31aa45042d53128339383fcd1c377b42c7")));
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.data.len(), 36);
        assert_eq!(&tx.data[..4], &hex!("6057361d"));
        assert_eq!(tx.v, 27);
        assert_eq!(
            tx.r,
            U256::from_be_bytes(b256!("28934b543809922b277e85f6bcf7b1f25e937de05c5138e17fdfa480ba74e84b").0)
        );
        assert_eq!(
            tx.s,
            U256::from_be_bytes(b256!("55a2a611763ffcb748547408093551928c9549f95a0a9cabd3b1f1f2e166cc16").0)
        );
        assert_eq!(tx.chain_id(), None);
    }

    #[test]
    fn accepts_unprefixed_hex() {
        let tx = decode(&RAW_TX[2..]).expect("bare hex decodes");
        assert_eq!(tx.nonce, 1);
    }

    #[test]
    fn signing_payload_matches_canonical_rlp() {
        let tx = decode(RAW_TX).unwrap();
        assert_eq!(hex::encode(tx.signing_payload()), SIGNING_PAYLOAD);
    }

    #[test]
    fn contract_creation_encodes_empty_to_slot() {
        let mut tx = decode(RAW_TX).unwrap();
        tx.to = None;
        // The `to` slot collapses to an empty byte string (0x80); value
        // keeps its own slot right after it.
        assert_eq!(
            hex::encode(tx.signing_payload()),
            "ed0180831e84808080a46057361d0000000000000000000000000000000000000000000000000000000000000159"
        );
    }

    #[test]
    fn roundtrip_recovers_sender() {
        let signer = PrivateKeySigner::random();
        let raw = testutil::sign_raw_tx(
            &signer,
            7,
            Some(address!("82a978b3f5962a5b0957d9ee9eef472ee55b42f1")),
            90_000,
            bytes!("deadbeef"),
        );
        let tx = decode(&raw).expect("self-signed tx decodes");
        assert_eq!(tx.sender, signer.address());
        assert_eq!(tx.nonce, 7);
        assert!(tx.v == 27 || tx.v == 28);
    }

    #[test]
    fn roundtrip_recovers_sender_eip155() {
        let signer = PrivateKeySigner::random();
        let raw = testutil::sign_raw_tx_eip155(&signer, 648, 3, None, 1_500_000, bytes!("60016000"));
        let tx = decode(&raw).expect("protected tx decodes");
        assert_eq!(tx.sender, signer.address());
        assert_eq!(tx.chain_id(), Some(648));
        assert_eq!(tx.to, None);
    }

    #[test]
    fn unsigned_list_is_a_bad_signature() {
        let tx = decode(RAW_TX).unwrap();
        let unsigned = hex::encode(tx.signing_payload());
        assert!(matches!(decode(&unsigned), Err(CodecError::MissingSignature)));
    }

    #[test]
    fn zero_r_is_a_bad_signature() {
        let mut tx = decode(RAW_TX).unwrap();
        tx.r = U256::ZERO;
        let raw = hex::encode(testutil::encode_signed(&tx));
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, CodecError::MissingSignature));
        assert_eq!(err.to_string(), "bad signature ECDSA");
    }

    #[test]
    fn v_below_homestead_range_is_a_bad_signature() {
        let mut tx = decode(RAW_TX).unwrap();
        tx.v = 3;
        let raw = hex::encode(testutil::encode_signed(&tx));
        assert!(matches!(decode(&raw), Err(CodecError::MissingSignature)));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let raw = format!("{}00", &RAW_TX[2..]);
        assert!(matches!(decode(&raw), Err(CodecError::Rlp(_))));
    }

    #[test]
    fn non_hex_input_is_rejected() {
        assert!(matches!(decode("0xzz"), Err(CodecError::Hex(_))));
    }

    #[test]
    fn non_list_input_is_rejected() {
        assert!(matches!(decode("0x82cafe"), Err(CodecError::Rlp(_))));
    }
}

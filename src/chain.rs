//! Chain client adapter.
//!
//! Typed access to the permissioned node: RelayHub submissions and views,
//! the permissioning contract, raw receipt retrieval, and the bootstrap
//! call that resolves the current RelayHub address from its proxy.
//!
//! Every operation opens its own short-lived HTTP transport and drops it on
//! return; nothing is pooled across requests. The [`ChainClient`] trait is
//! the seam the relay pipeline is generic over, with [`HttpChainClient`] as
//! the production implementation.

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, U256, bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use serde_json::Value;
use url::Url;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract RelayHub {
        function relayMetaTx(bytes signingData, uint8 v, bytes32 r, bytes32 s) external returns (bool success);
        function deployMetaTx(bytes signingData, uint8 v, bytes32 r, bytes32 s) external returns (bool success, address deployedAddress);
        function getNonce(address from) external view returns (uint256);
        function getGasLimit() external view returns (uint256);

        event TransactionRelayed(address indexed relay, address indexed from, address indexed to, bool executed, bytes output);
        event ContractDeployed(address indexed relay, address indexed from, address contractDeployed);
        event BadTransactionSent(address node, address originalSender, uint8 errorCode);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract AccountIngress {
        function accountPermitted(address account) external view returns (bool);
    }
}

/// Calldata understood by the RelayHub proxy as "return the current
/// implementation address". Its meaning is defined by the proxy contract.
const PROXY_IMPLEMENTATION_CALL: Bytes = bytes!("1000");

/// Upstream chain access failure.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// JSON-RPC transport failure.
    #[error(transparent)]
    Transport(#[from] alloy_transport::TransportError),
    /// Contract interaction failure (encoding, revert, decode).
    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),
    /// The node allowance read did not answer within its bound.
    #[error("gas allowance query timed out")]
    AllowanceTimeout,
    /// The proxy answered with something shorter than an address word.
    #[error("proxy returned {0} bytes, expected a 32-byte address word")]
    BadProxyAnswer(usize),
}

/// The outer RelayHub call assembled from a decoded client transaction.
///
/// `v`, `r`, `s` are the inner transaction's signature components, `r` and
/// `s` left-padded to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTx {
    pub signing_data: Bytes,
    pub v: u8,
    pub r: B256,
    pub s: B256,
    /// Outer gas limit; the same quantity the ledger admitted.
    pub gas_limit: u64,
    /// Route through `deployMetaTx` instead of `relayMetaTx`.
    pub deploy: bool,
}

/// Operations the relay pipeline needs from the chain.
pub trait ChainClient: Send + Sync {
    /// Submits the RelayHub meta-transaction and returns the transmitted
    /// hash without waiting for inclusion.
    fn send_meta_tx(
        &self,
        relay_hub: Address,
        call: MetaTx,
    ) -> impl Future<Output = Result<B256, ChainError>> + Send;

    /// Reads the node's current per-block gas allowance
    /// (`RelayHub.getGasLimit`).
    fn node_gas_limit(
        &self,
        relay_hub: Address,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Reads a sender's on-chain meta-transaction nonce
    /// (`RelayHub.getNonce`).
    fn relay_nonce(
        &self,
        relay_hub: Address,
        sender: Address,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Asks the permissioning contract whether `sender` may relay.
    fn account_permitted(
        &self,
        ingress: Address,
        sender: Address,
    ) -> impl Future<Output = Result<bool, ChainError>> + Send;

    /// Fetches a receipt as the untyped JSON map the node returned, or
    /// `None` when the transaction is unknown.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<Value>, ChainError>> + Send;
}

/// Production [`ChainClient`] speaking JSON-RPC over HTTP, one transport per
/// operation.
#[derive(Clone, Debug)]
pub struct HttpChainClient {
    node_url: Url,
    wallet: EthereumWallet,
    node_address: Address,
}

impl HttpChainClient {
    pub fn new(node_url: Url, signer: PrivateKeySigner) -> Self {
        let node_address = signer.address();
        Self { node_url, wallet: EthereumWallet::from(signer), node_address }
    }

    /// Address of the node's signing account.
    pub fn node_address(&self) -> Address {
        self.node_address
    }

    fn read_provider(&self) -> impl Provider {
        ProviderBuilder::new().connect_http(self.node_url.clone())
    }

    fn write_provider(&self) -> impl Provider {
        ProviderBuilder::new().wallet(self.wallet.clone()).connect_http(self.node_url.clone())
    }
}

impl ChainClient for HttpChainClient {
    async fn send_meta_tx(&self, relay_hub: Address, call: MetaTx) -> Result<B256, ChainError> {
        let provider = self.write_provider();
        let nonce = provider.get_transaction_count(self.node_address).pending().await?;
        let hub = RelayHub::new(relay_hub, &provider);
        // The outer transaction rides for free: zero gas price, explicit
        // gas, chain id filled from the node.
        let pending = if call.deploy {
            hub.deployMetaTx(call.signing_data, call.v, call.r, call.s)
                .nonce(nonce)
                .gas_price(0)
                .gas(call.gas_limit)
                .send()
                .await?
        } else {
            hub.relayMetaTx(call.signing_data, call.v, call.r, call.s)
                .nonce(nonce)
                .gas_price(0)
                .gas(call.gas_limit)
                .send()
                .await?
        };
        Ok(*pending.tx_hash())
    }

    async fn node_gas_limit(&self, relay_hub: Address) -> Result<U256, ChainError> {
        let provider = self.read_provider();
        let hub = RelayHub::new(relay_hub, &provider);
        Ok(hub.getGasLimit().from(self.node_address).call().await?)
    }

    async fn relay_nonce(&self, relay_hub: Address, sender: Address) -> Result<U256, ChainError> {
        let provider = self.read_provider();
        let hub = RelayHub::new(relay_hub, &provider);
        Ok(hub.getNonce(sender).from(self.node_address).call().await?)
    }

    async fn account_permitted(&self, ingress: Address, sender: Address) -> Result<bool, ChainError> {
        let provider = self.read_provider();
        let rules = AccountIngress::new(ingress, &provider);
        Ok(rules.accountPermitted(sender).call().await?)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<Value>, ChainError> {
        let provider = self.read_provider();
        let receipt: Option<Value> =
            provider.client().request("eth_getTransactionReceipt", (hash,)).await?;
        Ok(receipt)
    }
}

/// Resolves the current RelayHub address through its proxy contract.
///
/// The proxy answers the [`PROXY_IMPLEMENTATION_CALL`] with one 32-byte
/// word whose trailing 20 bytes are the implementation address.
pub async fn resolve_relay_hub(node_url: &Url, proxy: Address) -> Result<Address, ChainError> {
    let provider = ProviderBuilder::new().connect_http(node_url.clone());
    let request = TransactionRequest::default()
        .with_to(proxy)
        .with_input(PROXY_IMPLEMENTATION_CALL);
    let answer = provider.call(request).await?;
    if answer.len() < Address::len_bytes() {
        return Err(ChainError::BadProxyAnswer(answer.len()));
    }
    Ok(Address::from_slice(&answer[answer.len() - Address::len_bytes()..]))
}

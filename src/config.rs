//! Configuration for the relay-signer gateway.
//!
//! Settings come from a JSON file (path via `--config` / `$CONFIG`,
//! default `config.json`), with host and port falling back to the `$HOST`
//! and `$PORT` environment variables. The node signing key never touches
//! the file: it is read from the `WRITER_KEY` environment variable at
//! startup.

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::chain::ChainError;

/// CLI arguments for the relay-signer gateway.
#[derive(Parser, Debug)]
#[command(name = "relay-signer")]
#[command(about = "Gas-relay signer JSON-RPC gateway")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    pub application: ApplicationConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Node endpoints and RelayHub bootstrap settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// HTTP JSON-RPC endpoint of the permissioned node.
    pub node_url: Url,
    /// Websocket endpoint used for the `newHeads` subscription.
    pub ws_url: Url,
    /// Proxy contract that answers with the current RelayHub address.
    pub contract_address: Address,
    /// Route contract-creation transactions through `deployMetaTx`.
    /// RelayHub also accepts creations on `relayMetaTx`, which stays the
    /// default.
    #[serde(default)]
    pub deploy_meta_tx: bool,
}

/// Sender permissioning settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub permissions_enabled: bool,
    /// Address of the permissioning contract; required when
    /// `permissions_enabled` is set.
    #[serde(default)]
    pub account_contract_address: Option<String>,
}

impl SecurityConfig {
    /// The permissioning contract to consult, or `None` when permissioning
    /// is disabled.
    pub fn permission_contract(&self) -> Result<Option<Address>, InitError> {
        if !self.permissions_enabled {
            return Ok(None);
        }
        let raw = self
            .account_contract_address
            .as_deref()
            .ok_or(InitError::InvalidAccountContract)?;
        let address = raw.parse::<Address>().map_err(|_| InitError::InvalidAccountContract)?;
        Ok(Some(address))
    }
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};

    pub const DEFAULT_PORT: u16 = 8080;

    /// Default port with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT)
    }

    /// Default host with fallback: $HOST env var -> 0.0.0.0
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    /// Get the port value.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the host value as an IpAddr.
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Load configuration from CLI arguments and JSON file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// Startup failures, carrying the JSON-RPC style error codes the gateway
/// reports before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("environment variable WRITER_KEY not set")]
    MissingWriterKey,
    #[error("invalid ECDSA key")]
    InvalidWriterKey,
    #[error("invalid account smart contract address")]
    InvalidAccountContract,
    #[error("can't get RelayHub smart contract address from proxy: {0}")]
    RelayHubResolution(ChainError),
}

impl InitError {
    pub fn code(&self) -> i32 {
        match self {
            InitError::MissingWriterKey | InitError::InvalidWriterKey => -32602,
            InitError::InvalidAccountContract => -32608,
            InitError::RelayHubResolution(_) => -32610,
        }
    }
}

/// Node signing key sourced from the `WRITER_KEY` environment variable.
///
/// The variable carries a 66-character `0x…` hex string; characters 2..66
/// are the 32-byte secp256k1 secret. The first two characters are dropped
/// without inspection.
#[derive(Clone, Copy)]
pub struct WriterKey(B256);

impl WriterKey {
    pub const ENV: &'static str = "WRITER_KEY";

    pub fn from_env() -> Result<Self, InitError> {
        let raw = std::env::var(Self::ENV).map_err(|_| InitError::MissingWriterKey)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, InitError> {
        let digits = raw.get(2..66).ok_or(InitError::InvalidWriterKey)?;
        let bytes =
            alloy_primitives::hex::decode(digits).map_err(|_| InitError::InvalidWriterKey)?;
        if bytes.len() != 32 {
            return Err(InitError::InvalidWriterKey);
        }
        Ok(Self(B256::from_slice(&bytes)))
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, InitError> {
        PrivateKeySigner::from_bytes(&self.0).map_err(|_| InitError::InvalidWriterKey)
    }
}

impl std::fmt::Debug for WriterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WriterKey(..)")
    }
}

/// Immutable per-process context assembled at startup.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Address of the node's signing account.
    pub address: Address,
    /// Resolved RelayHub contract address.
    pub relay_hub: Address,
    /// Permissioning contract, when enabled.
    pub permissions: Option<Address>,
    /// Route contract creations through `deployMetaTx`.
    pub deploy_meta_tx: bool,
}

//! JSON-RPC front door.
//!
//! One POST route carries the whole protocol: a JSON-RPC 2.0 envelope whose
//! `method` selects between `eth_sendRawTransaction`,
//! `eth_getTransactionCount`, and `eth_getTransactionReceipt`. Request ids
//! are echoed back verbatim. Every failure — decode, permission, gas,
//! upstream — leaves through the same error envelope with a textual
//! message; no error hierarchy is exposed to clients.

use alloy_primitives::{Address, B256, hex};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Value, json};
use tracing::instrument;

use crate::relayer::{NonceTag, RelayError, Relayer};

pub const JSONRPC_VERSION: &str = "2.0";

/// Default code for request-level failures.
const SERVER_ERROR: i32 = -32000;
const METHOD_NOT_FOUND: i32 = -32601;

/// Incoming JSON-RPC 2.0 envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    /// Echoed back untouched, whatever JSON it holds.
    #[serde(default)]
    pub id: Option<Box<RawValue>>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Outgoing JSON-RPC 2.0 envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: Option<Box<RawValue>>, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: Some(result), error: None }
    }

    fn error(id: Option<Box<RawValue>>, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcError {
    fn server(message: impl ToString) -> Self {
        Self { code: SERVER_ERROR, message: message.to_string() }
    }

    fn internal() -> Self {
        Self::server(RelayError::Internal)
    }

    fn method_not_found(method: &str) -> Self {
        Self { code: METHOD_NOT_FOUND, message: format!("the method {method} is not available") }
    }
}

pub fn routes<R>() -> Router<R>
where
    R: Relayer + Clone + Send + Sync + 'static,
{
    Router::new().route("/", get(get_root)).route("/", post(post_rpc::<R>))
}

/// `GET /`: liveness probe.
#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

/// `POST /`: the JSON-RPC endpoint.
#[instrument(skip_all, fields(method = %request.method))]
async fn post_rpc<R>(
    State(relayer): State<R>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse>
where
    R: Relayer + Clone + Send + Sync + 'static,
{
    let id = request.id.clone();
    let response = match dispatch(&relayer, &request).await {
        Ok(result) => JsonRpcResponse::result(id, result),
        Err(error) => {
            tracing::warn!(
                method = %request.method,
                code = error.code,
                message = %error.message,
                "request failed"
            );
            JsonRpcResponse::error(id, error)
        }
    };
    Json(response)
}

async fn dispatch<R: Relayer>(
    relayer: &R,
    request: &JsonRpcRequest,
) -> Result<Value, JsonRpcError> {
    match request.method.as_str() {
        "eth_sendRawTransaction" => {
            let params = string_params(&request.params)?;
            let raw = params.first().ok_or_else(JsonRpcError::internal)?;
            // The wire format always carries a 0x prefix; the first two
            // characters are dropped without inspection.
            let stripped = raw.get(2..).unwrap_or_default();
            let hash = relayer.relay(stripped).await.map_err(JsonRpcError::server)?;
            Ok(json!(hash))
        }
        "eth_getTransactionCount" => {
            let params = string_params(&request.params)?;
            let sender = params
                .first()
                .ok_or_else(JsonRpcError::internal)
                .and_then(|raw| lenient_address(raw))?;
            let tag = NonceTag::parse(params.get(1).map(String::as_str))
                .map_err(JsonRpcError::server)?;
            let count =
                relayer.transaction_count(sender, tag).await.map_err(JsonRpcError::server)?;
            Ok(json!(format!("0x{count:x}")))
        }
        "eth_getTransactionReceipt" => {
            let params = string_params(&request.params)?;
            let raw = params.first().ok_or_else(JsonRpcError::internal)?;
            let hash: B256 = raw
                .get(2..)
                .unwrap_or_default()
                .parse()
                .map_err(|_| JsonRpcError::internal())?;
            let receipt =
                relayer.transaction_receipt(hash).await.map_err(JsonRpcError::server)?;
            Ok(receipt.unwrap_or(Value::Null))
        }
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

fn string_params(params: &Value) -> Result<Vec<String>, JsonRpcError> {
    serde_json::from_value(params.clone()).map_err(|_| JsonRpcError::internal())
}

/// Parses an address parameter, keeping the trailing 20 bytes of whatever
/// hex arrives; 32-byte account identifiers used by some clients resolve to
/// their address part.
fn lenient_address(raw: &str) -> Result<Address, JsonRpcError> {
    let digits =
        raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    let padded =
        if digits.len() % 2 == 1 { format!("0{digits}") } else { digits.to_owned() };
    let bytes = hex::decode(&padded).map_err(|_| JsonRpcError::internal())?;
    let mut word = [0u8; 20];
    if bytes.len() >= 20 {
        word.copy_from_slice(&bytes[bytes.len() - 20..]);
    } else {
        word[20 - bytes.len()..].copy_from_slice(&bytes);
    }
    Ok(Address::from(word))
}

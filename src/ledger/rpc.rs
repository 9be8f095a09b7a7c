use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::ledger::client::{CallRequest, LedgerClient, LogFilter, RawLog};

/// Transport-level errors from the ledger node connection.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct LogBody {
    address: String,
    topics: Vec<String>,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
}

/// Ethereum JSON-RPC implementation of [`LedgerClient`].
///
/// Accounts and signing stay on the node side (eth_accounts /
/// eth_sendTransaction); this client only shuttles hex-encoded envelopes.
pub struct JsonRpcLedgerClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    pub fn new(url: &str) -> Self {
        Self {
            http: Client::new(),
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| RpcError::Malformed(format!("{}: neither result nor error", method)))
    }

    fn call_params(request: &CallRequest) -> Value {
        let mut object = serde_json::Map::new();
        if let Some(from) = request.from {
            object.insert("from".to_string(), json!(encode_address(&from)));
        }
        object.insert("to".to_string(), json!(encode_address(&request.to)));
        if let Some(gas) = request.gas {
            object.insert("gas".to_string(), json!(encode_quantity(gas)));
        }
        if let Some(gas_price) = request.gas_price {
            object.insert("gasPrice".to_string(), json!(encode_u256(&gas_price)));
        }
        if let Some(value) = request.value {
            object.insert("value".to_string(), json!(encode_u256(&value)));
        }
        object.insert("data".to_string(), json!(encode_data(&request.data)));
        Value::Object(object)
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn get_accounts(&self) -> Result<Vec<Address>, RpcError> {
        let result = self.request("eth_accounts", json!([])).await?;
        let raw: Vec<String> = serde_json::from_value(result)
            .map_err(|e| RpcError::Malformed(format!("eth_accounts: {}", e)))?;
        raw.iter().map(|s| decode_address(s)).collect()
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let to_block = match filter.to_block {
            Some(block) => encode_quantity(block),
            None => "latest".to_string(),
        };
        let params = json!([{
            "address": encode_address(&filter.address),
            "topics": [encode_b256(&filter.topic0)],
            "fromBlock": encode_quantity(filter.from_block),
            "toBlock": to_block,
        }]);

        let result = self.request("eth_getLogs", params).await?;
        let bodies: Vec<LogBody> = serde_json::from_value(result)
            .map_err(|e| RpcError::Malformed(format!("eth_getLogs: {}", e)))?;

        bodies.into_iter().map(decode_log).collect()
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError> {
        let params = json!([Self::call_params(request), "latest"]);
        let result = self.request("eth_call", params).await?;
        let raw: String = serde_json::from_value(result)
            .map_err(|e| RpcError::Malformed(format!("eth_call: {}", e)))?;
        decode_data(&raw)
    }

    async fn send_transaction(&self, request: &CallRequest) -> Result<B256, RpcError> {
        let params = json!([Self::call_params(request)]);
        let result = self.request("eth_sendTransaction", params).await?;
        let raw: String = serde_json::from_value(result)
            .map_err(|e| RpcError::Malformed(format!("eth_sendTransaction: {}", e)))?;
        decode_b256(&raw)
    }
}

fn decode_log(body: LogBody) -> Result<RawLog, RpcError> {
    let topics = body
        .topics
        .iter()
        .map(|t| decode_b256(t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawLog {
        address: decode_address(&body.address)?,
        topics,
        data: decode_data(&body.data)?,
        block_number: decode_quantity(&body.block_number)?,
    })
}

fn strip_0x(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}

pub(crate) fn encode_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

pub(crate) fn encode_u256(value: &U256) -> String {
    format!("0x{:x}", value)
}

pub(crate) fn encode_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub(crate) fn encode_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

pub(crate) fn encode_b256(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

fn decode_quantity(raw: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(strip_0x(raw), 16)
        .map_err(|e| RpcError::Malformed(format!("quantity {}: {}", raw, e)))
}

fn decode_data(raw: &str) -> Result<Vec<u8>, RpcError> {
    hex::decode(strip_0x(raw)).map_err(|e| RpcError::Malformed(format!("data {}: {}", raw, e)))
}

fn decode_address(raw: &str) -> Result<Address, RpcError> {
    let bytes = decode_data(raw)?;
    if bytes.len() != 20 {
        return Err(RpcError::Malformed(format!("address {}: bad length", raw)));
    }
    Ok(Address::from_slice(&bytes))
}

fn decode_b256(raw: &str) -> Result<B256, RpcError> {
    let bytes = decode_data(raw)?;
    if bytes.len() != 32 {
        return Err(RpcError::Malformed(format!("hash {}: bad length", raw)));
    }
    Ok(B256::from_slice(&bytes))
}

//! L1 access used by the pipeline and the keyed broadcaster.
//!
//! [`EthRpcClient`] is a thin JSON-RPC over HTTP client with exponential
//! backoff for transport errors on reads. Transaction submission is never
//! retried: a timed-out send may already sit in the node's pool.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

/// The deterministic CREATE2 deployer every L1 must carry before deploying.
pub const DETERMINISTIC_DEPLOYER_ADDRESS: Address = ethereum_types::H160(hex_literal::hex!(
    "4e59b44847b379578588920ca78fbf26c0b4956c"
));

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Connection to {url} failed: {cause}")]
    ConnectionFailed { url: String, cause: String },

    #[error("{method} timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("{method} HTTP {status}: {body}")]
    HttpError {
        method: String,
        status: u16,
        body: String,
    },

    #[error("{method} JSON-RPC error {code}: {message}")]
    JsonRpcError {
        method: String,
        code: i64,
        message: String,
    },

    #[error("{method} response parse error in {field}: {cause}")]
    ParseError {
        method: String,
        field: String,
        cause: String,
    },

    #[error("{method} failed after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        method: String,
        attempts: u32,
        last_error: Box<RpcError>,
    },
}

impl RpcError {
    /// Whether this error is likely transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::ConnectionFailed { .. } | RpcError::Timeout { .. } => true,
            // 429 = rate limited, 502/503/504 = server issues
            RpcError::HttpError { status, .. } => matches!(*status, 429 | 502 | 503 | 504),
            RpcError::JsonRpcError { .. }
            | RpcError::ParseError { .. }
            | RpcError::RetryExhausted { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub hash: H256,
    pub parent_hash: H256,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub number: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub timestamp: u64,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: H256,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub block_number: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub status: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

#[async_trait]
pub trait L1Client: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    async fn latest_header(&self) -> Result<BlockHeader, RpcError>;

    async fn header_by_hash(&self, hash: H256) -> Result<BlockHeader, RpcError>;

    async fn suggest_gas_tip_cap(&self) -> Result<U256, RpcError>;

    async fn code_at(&self, address: Address) -> Result<Bytes, RpcError>;

    async fn pending_nonce_at(&self, address: Address) -> Result<u64, RpcError>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, RpcError>;

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TxReceipt>, RpcError>;
}

/// Configuration for RPC client behavior.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient errors (default: 3).
    pub max_retries: u32,
    /// Base backoff duration, doubled on each retry (default: 1s).
    pub base_backoff: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

pub struct EthRpcClient {
    http: reqwest::Client,
    url: Url,
    config: RpcConfig,
}

impl EthRpcClient {
    pub fn new(url: Url) -> Self {
        Self::with_config(url, RpcConfig::default())
    }

    pub fn with_config(url: Url, config: RpcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http, url, config }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let result = self.rpc_call(method, params).await?;
        decode_result(method, result)
    }

    /// Like [`Self::call`] but with a single attempt.
    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let result = self.rpc_call_once(method, &request_body(method, params)).await?;
        decode_result(method, result)
    }

    /// Execute a JSON-RPC call with retry and backoff.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = request_body(method, params);

        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            match self.rpc_call_once(method, &body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    let backoff = self.config.base_backoff * 2u32.saturating_pow(attempt);
                    debug!(method, attempt, error = %err, "retrying RPC call");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) if attempt > 0 => {
                    return Err(RpcError::RetryExhausted {
                        method: method.into(),
                        attempts: attempt + 1,
                        last_error: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Single attempt at an RPC call (no retry).
    async fn rpc_call_once(&self, method: &str, body: &Value) -> Result<Value, RpcError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        method: method.into(),
                        elapsed_ms: u64::try_from(self.config.timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    }
                } else {
                    RpcError::ConnectionFailed {
                        url: self.url.to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpError {
                method: method.into(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let json_response: Value = response.json().await.map_err(|e| RpcError::ParseError {
            method: method.into(),
            field: "response_body".into(),
            cause: e.to_string(),
        })?;

        if let Some(error) = json_response.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            return Err(RpcError::JsonRpcError {
                method: method.into(),
                code,
                message,
            });
        }

        json_response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::ParseError {
                method: method.into(),
                field: "result".into(),
                cause: "missing result field".into(),
            })
    }
}

#[async_trait]
impl L1Client for EthRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let value: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity("eth_chainId", &value)
    }

    async fn latest_header(&self) -> Result<BlockHeader, RpcError> {
        let block: Option<BlockHeader> = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        block.ok_or_else(|| not_found("eth_getBlockByNumber"))
    }

    async fn header_by_hash(&self, hash: H256) -> Result<BlockHeader, RpcError> {
        let block: Option<BlockHeader> = self
            .call("eth_getBlockByHash", json!([format!("{hash:#x}"), false]))
            .await?;
        block.ok_or_else(|| not_found("eth_getBlockByHash"))
    }

    async fn suggest_gas_tip_cap(&self) -> Result<U256, RpcError> {
        self.call("eth_maxPriorityFeePerGas", json!([])).await
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, RpcError> {
        let code: String = self
            .call("eth_getCode", json!([format!("{address:#x}"), "latest"]))
            .await?;
        hex::decode(code.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| RpcError::ParseError {
                method: "eth_getCode".into(),
                field: "result".into(),
                cause: e.to_string(),
            })
    }

    async fn pending_nonce_at(&self, address: Address) -> Result<u64, RpcError> {
        let value: String = self
            .call(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), "pending"]),
            )
            .await?;
        parse_quantity("eth_getTransactionCount", &value)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, RpcError> {
        self.call_once(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TxReceipt>, RpcError> {
        self.call("eth_getTransactionReceipt", json!([format!("{hash:#x}")]))
            .await
    }
}

fn request_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, RpcError> {
    serde_json::from_value(result).map_err(|e| RpcError::ParseError {
        method: method.into(),
        field: "result".into(),
        cause: e.to_string(),
    })
}

fn parse_quantity(method: &str, value: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|e| RpcError::ParseError {
        method: method.into(),
        field: "result".into(),
        cause: e.to_string(),
    })
}

fn not_found(method: &str) -> RpcError {
    RpcError::ParseError {
        method: method.into(),
        field: "result".into(),
        cause: "block not found".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_header() {
        let header: BlockHeader = serde_json::from_value(json!({
            "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "parentHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "number": "0x727172",
            "timestamp": "0x67ab3c20",
            "baseFeePerGas": "0x3b9aca00",
            "miner": "0x0000000000000000000000000000000000000000"
        }))
        .unwrap();
        assert_eq!(header.number, 7_499_122);
        assert_eq!(header.base_fee_per_gas, Some(U256::from(1_000_000_000u64)));
    }

    #[test]
    fn header_number_must_be_hex_quantity() {
        let result = serde_json::from_value::<BlockHeader>(json!({
            "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "parentHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "number": 7499122,
            "timestamp": "0x67ab3c20"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn retryable_errors() {
        let rate_limited = RpcError::HttpError {
            method: "eth_chainId".into(),
            status: 429,
            body: String::new(),
        };
        let reverted = RpcError::JsonRpcError {
            method: "eth_sendRawTransaction".into(),
            code: -32000,
            message: "nonce too low".into(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!reverted.is_retryable());
    }
}

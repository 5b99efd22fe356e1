//! Chain client
//!
//! Everything the orchestrator needs from the node: fee quotes, nonces,
//! the game's current epoch, raw transaction submission and receipts.
//! `RpcChainClient` speaks plain JSON-RPC over reqwest.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::services::chain_errors::{ChainError, RpcErrorObject};
use crate::services::tx_builder::current_epoch_calldata;
use crate::types::{FeeParameters, ReceiptStatus, SignedTransaction, TransactionReceipt};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Current fee quote. Call right before every build; never reuse.
    async fn estimate_fees(&self) -> Result<FeeParameters, ChainError>;

    /// Number of confirmed transactions sent from `address`
    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError>;

    /// `currentEpoch()` of the game contract
    async fn read_current_epoch(&self) -> Result<U256, ChainError>;

    /// Submit a signed transaction. Returns as soon as the node accepts it.
    async fn broadcast(&self, tx: SignedTransaction) -> Result<B256, ChainError>;

    /// Wait until `tx_hash` is included or `max_wait` elapses
    async fn wait_for_receipt(&self, tx_hash: B256, max_wait: Duration) -> Result<TransactionReceipt, ChainError>;
}

/// Connection settings for `RpcChainClient`
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub url: String,
    pub chain_id: u64,
    pub game: Address,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub base_fee_multiplier_pct: u64,
}

impl RpcSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            game: config.contracts.game,
            request_timeout: config.rpc_timeout,
            poll_interval: config.receipt_poll_interval,
            base_fee_multiplier_pct: config.base_fee_multiplier_pct,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// JSON-RPC node client
pub struct RpcChainClient {
    client: reqwest::Client,
    settings: RpcSettings,
    next_id: AtomicU64,
}

impl RpcChainClient {
    pub fn new(settings: RpcSettings) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ChainError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a client and check the node serves the configured chain
    pub async fn connect(settings: RpcSettings) -> Result<Self, ChainError> {
        let client = Self::new(settings)?;
        let actual = client.chain_id().await?;
        if actual != client.settings.chain_id {
            return Err(ChainError::ChainIdMismatch {
                expected: client.settings.chain_id,
                actual,
            });
        }
        info!("Connected to {} (chain id {})", client.settings.url, actual);
        Ok(client)
    }

    async fn send(&self, method: &str, params: Value) -> Result<RpcResponse, ChainError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let resp = self
            .client
            .post(&self.settings.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainError::from_network_error(&e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::from_http_status(status, &body));
        }

        resp.json::<RpcResponse>()
            .await
            .map_err(|e| ChainError::NodeRejection(format!("{}: unreadable response: {}", method, e)))
    }

    /// Call a read method; JSON-RPC errors become `NodeRejection`
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let resp = self.send(method, params).await?;
        if let Some(err) = resp.error {
            return Err(ChainError::from_rpc_error(method, &err));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    async fn request_quantity(&self, method: &str, params: Value) -> Result<U256, ChainError> {
        let result = self.request(method, params).await?;
        parse_quantity(&result).ok_or_else(|| {
            ChainError::NodeRejection(format!("{}: expected hex quantity, got {}", method, result))
        })
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, ChainError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([format!("{:?}", tx_hash)]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result).map(Some)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let id = self.request_quantity("eth_chainId", json!([])).await?;
        u64::try_from(id).map_err(|_| ChainError::NodeRejection(format!("chain id {} out of range", id)))
    }

    async fn estimate_fees(&self) -> Result<FeeParameters, ChainError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = block
            .get("baseFeePerGas")
            .and_then(parse_quantity)
            .ok_or_else(|| ChainError::NodeRejection("latest block has no baseFeePerGas".to_string()))?;
        let priority = self
            .request_quantity("eth_maxPriorityFeePerGas", json!([]))
            .await?;

        let fees = compute_fee_parameters(
            to_u128(base_fee, "baseFeePerGas")?,
            to_u128(priority, "maxPriorityFeePerGas")?,
            self.settings.base_fee_multiplier_pct,
        );
        debug!(
            "Fee quote: base={} maxFee={} priority={}",
            base_fee, fees.max_fee_per_gas, fees.max_priority_fee_per_gas
        );
        Ok(fees)
    }

    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError> {
        let count = self
            .request_quantity(
                "eth_getTransactionCount",
                json!([format!("{:?}", address), "latest"]),
            )
            .await?;
        u64::try_from(count).map_err(|_| ChainError::NodeRejection(format!("nonce {} out of range", count)))
    }

    async fn read_current_epoch(&self) -> Result<U256, ChainError> {
        let result = self
            .request(
                "eth_call",
                json!([{
                    "to": format!("{:?}", self.settings.game),
                    "data": format!("0x{}", hex::encode(current_epoch_calldata())),
                }, "latest"]),
            )
            .await?;
        let data = result
            .as_str()
            .ok_or_else(|| ChainError::NodeRejection(format!("eth_call: unexpected result {}", result)))?;
        decode_uint_word(data)
    }

    async fn broadcast(&self, tx: SignedTransaction) -> Result<B256, ChainError> {
        let SignedTransaction { raw, hash, sender } = tx;
        let resp = self
            .send("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(&raw))]))
            .await?;

        if let Some(err) = resp.error {
            let err = ChainError::from_submission_error(&err);
            warn!("Submission from {:?} rejected: {}", sender, err);
            return Err(err);
        }

        let returned = resp
            .result
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<B256>().ok());
        match returned {
            Some(node_hash) if node_hash != hash => {
                warn!("Node returned hash {} for locally computed {}", node_hash, hash);
                Ok(node_hash)
            }
            _ => Ok(hash),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256, max_wait: Duration) -> Result<TransactionReceipt, ChainError> {
        let started = Instant::now();
        let poll = async {
            loop {
                match self.get_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => debug!("Receipt poll for {} failed: {}", tx_hash, e),
                }
                sleep(self.settings.poll_interval).await;
            }
        };

        let receipt = timeout(max_wait, poll)
            .await
            .map_err(|_| ChainError::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
                waited: started.elapsed(),
            })?;

        match receipt.status {
            ReceiptStatus::Success => Ok(receipt),
            ReceiptStatus::Failure => Err(ChainError::ExecutionReverted {
                tx_hash: tx_hash.to_string(),
                block_number: receipt.block_number,
            }),
        }
    }
}

/// `max_fee = base_fee * multiplier_pct / 100 + priority`
pub fn compute_fee_parameters(base_fee: u128, priority: u128, multiplier_pct: u64) -> FeeParameters {
    let scaled_base = base_fee.saturating_mul(multiplier_pct as u128) / 100;
    FeeParameters {
        max_fee_per_gas: scaled_base.saturating_add(priority),
        max_priority_fee_per_gas: priority,
        max_fee_per_blob_gas: None,
    }
}

/// Parse a JSON-RPC hex quantity (`"0x1a"`)
pub fn parse_quantity(value: &Value) -> Option<U256> {
    let s = value.as_str()?;
    let hex_str = s.strip_prefix("0x")?;
    if hex_str.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(hex_str, 16).ok()
}

fn to_u128(value: U256, field: &str) -> Result<u128, ChainError> {
    u128::try_from(value).map_err(|_| ChainError::NodeRejection(format!("{} {} out of range", field, value)))
}

/// Decode the first 32-byte word of `eth_call` output as uint256
pub fn decode_uint_word(data: &str) -> Result<U256, ChainError> {
    let hex_str = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainError::NodeRejection(format!("eth_call returned invalid hex: {}", e)))?;
    if bytes.len() < 32 {
        return Err(ChainError::NodeRejection(format!(
            "eth_call returned {} bytes, expected a 32-byte word",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes[..32]))
}

/// Parse an `eth_getTransactionReceipt` result object
pub fn parse_receipt(value: &Value) -> Result<TransactionReceipt, ChainError> {
    let field = |name: &str| {
        value
            .get(name)
            .ok_or_else(|| ChainError::NodeRejection(format!("receipt missing {}", name)))
    };

    let transaction_hash = field("transactionHash")?
        .as_str()
        .and_then(|s| s.parse::<B256>().ok())
        .ok_or_else(|| ChainError::NodeRejection("receipt has invalid transactionHash".to_string()))?;
    let block_number = parse_quantity(field("blockNumber")?)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| ChainError::NodeRejection("receipt has invalid blockNumber".to_string()))?;
    let block_hash = value
        .get("blockHash")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<B256>().ok());
    let status = match parse_quantity(field("status")?) {
        Some(s) if s == U256::from(1) => ReceiptStatus::Success,
        Some(s) if s.is_zero() => ReceiptStatus::Failure,
        _ => return Err(ChainError::NodeRejection("receipt has invalid status".to_string())),
    };

    Ok(TransactionReceipt {
        transaction_hash,
        status,
        block_number,
        block_hash,
    })
}

//! JSON-RPC chain client
//!
//! Thin adapter over the node's `eth_*` methods. Transactions are sent with
//! `eth_sendTransaction`, so the node must hold the account's key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::config::{ChainConfig, GasPrice, GasStrategy};
use crate::common::{Error, Result};

use super::abi;
use super::{Address, ChainClient, InclusionStatus, Payload, Transaction, TxId};

/// Gas limit is the node's estimate times this factor
const GAS_ESTIMATE_FACTOR: u128 = 2;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Chain client speaking JSON-RPC over HTTP
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    gas_price: GasPrice,
    /// Hex deployment bytecode for `Payload::DeployToken`
    token_bytecode: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client from the chain configuration
    ///
    /// Every request is bounded by `request_timeout_secs`.
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let token_bytecode = match &config.token_bytecode_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })?;
                let trimmed = content.trim();
                Some(trimmed.strip_prefix("0x").unwrap_or(trimmed).to_string())
            }
            None => None,
        };

        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            gas_price: config.gas_price,
            token_bytecode,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::rpc(method, e.to_string()))?;

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::rpc(method, format!("Invalid response: {}", e)))?;

        if let Some(err) = response.error {
            return Err(Error::rpc(method, format!("{} (code {})", err.message, err.code)));
        }
        Ok(response.result)
    }

    async fn quantity_request(&self, method: &str, params: Value) -> Result<u128> {
        let value = self.request(method, params).await?;
        let s = value
            .as_str()
            .ok_or_else(|| Error::rpc(method, format!("Expected hex quantity, got {}", value)))?;
        abi::parse_quantity(s)
    }

    fn call_data(&self, payload: &Payload) -> Result<String> {
        Ok(match payload {
            Payload::TokenTransfer { to, amount } => abi::encode_transfer(to, *amount),
            Payload::Mint { amount } => abi::encode_mint(*amount),
            Payload::DeployToken { name, symbol } => {
                let bytecode = self.token_bytecode.as_ref().ok_or_else(|| {
                    Error::Config(
                        "Deploying a token requires chain.token_bytecode_file".to_string(),
                    )
                })?;
                format!(
                    "0x{}{}",
                    bytecode,
                    abi::encode_token_constructor(name, symbol)
                )
            }
        })
    }

    fn tx_object(&self, tx: &Transaction) -> Result<serde_json::Map<String, Value>> {
        let mut obj = serde_json::Map::new();
        obj.insert("from".into(), json!(tx.from.as_str()));
        if let Some(to) = &tx.to {
            obj.insert("to".into(), json!(to.as_str()));
        }
        obj.insert("data".into(), json!(self.call_data(&tx.payload)?));
        if let Some(nonce) = tx.nonce {
            obj.insert("nonce".into(), json!(abi::quantity(nonce as u128)));
        }
        Ok(obj)
    }

    /// Gas price to send with, `None` leaves it to the node
    async fn resolve_gas_price(&self) -> Result<Option<u128>> {
        match self.gas_price {
            GasPrice::Node => Ok(None),
            GasPrice::Fixed(price) => Ok(Some(price as u128)),
            GasPrice::Strategy(GasStrategy::Medium) => {
                Ok(Some(self.quantity_request("eth_gasPrice", json!([])).await?))
            }
            GasPrice::Strategy(GasStrategy::Fast) => {
                let price = self.quantity_request("eth_gasPrice", json!([])).await?;
                Ok(Some(price.saturating_mul(2)))
            }
        }
    }

    async fn estimate_gas(&self, tx: &Transaction) -> Result<u128> {
        let obj = self.tx_object(tx)?;
        self.quantity_request("eth_estimateGas", json!([obj])).await
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn submit(&self, tx: &Transaction) -> Result<TxId> {
        let gas = self.estimate_gas(tx).await?.saturating_mul(GAS_ESTIMATE_FACTOR);
        let mut obj = self.tx_object(tx)?;
        obj.insert("gas".into(), json!(abi::quantity(gas)));
        if let Some(price) = self.resolve_gas_price().await? {
            obj.insert("gasPrice".into(), json!(abi::quantity(price)));
        }

        let result = self.request("eth_sendTransaction", json!([obj])).await?;
        let hash = result.as_str().ok_or_else(|| {
            Error::rpc("eth_sendTransaction", format!("Expected hash, got {}", result))
        })?;
        Ok(TxId::new(hash))
    }

    async fn inclusion_status(&self, id: &TxId) -> Result<InclusionStatus> {
        let tx = self
            .request("eth_getTransactionByHash", json!([id.as_str()]))
            .await?;
        if tx.is_null() {
            return Ok(InclusionStatus::Unknown);
        }
        match tx.get("blockNumber").and_then(Value::as_str) {
            Some(block) => Ok(InclusionStatus::Included {
                block_number: abi::parse_quantity(block)? as u64,
            }),
            None => Ok(InclusionStatus::Pending),
        }
    }

    async fn estimate_fee(&self, tx: &Transaction) -> Result<u128> {
        let gas = self.estimate_gas(tx).await?;
        let price = match self.resolve_gas_price().await? {
            Some(price) => price,
            None => self.quantity_request("eth_gasPrice", json!([])).await?,
        };
        Ok(gas.saturating_mul(price))
    }

    async fn transaction_count(&self, address: &Address) -> Result<u64> {
        let count = self
            .quantity_request(
                "eth_getTransactionCount",
                json!([address.as_str(), "pending"]),
            )
            .await?;
        u64::try_from(count).map_err(|_| Error::Chain(format!("Nonce {} out of range", count)))
    }

    async fn has_code(&self, address: &Address) -> Result<bool> {
        let code = self
            .request("eth_getCode", json!([address.as_str(), "latest"]))
            .await?;
        let code = code.as_str().unwrap_or("0x");
        Ok(!code.trim_start_matches("0x").is_empty())
    }

    async fn contract_address(&self, id: &TxId) -> Result<Option<Address>> {
        let receipt = self
            .request("eth_getTransactionReceipt", json!([id.as_str()]))
            .await?;
        match receipt.get("contractAddress").and_then(Value::as_str) {
            Some(address) => Ok(Some(Address::parse(address)?)),
            None => Ok(None),
        }
    }

    async fn token_balance(&self, token: &Address, owner: &Address) -> Result<u128> {
        self.quantity_request(
            "eth_call",
            json!([
                { "to": token.as_str(), "data": abi::encode_balance_of(owner) },
                "latest"
            ]),
        )
        .await
    }
}

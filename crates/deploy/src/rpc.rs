//! JSON-RPC chain client for Ethereum-compatible endpoints.

use std::time::Duration;

use alloy_core::{
    primitives::{Address, Bytes, TxHash},
    sol_types::{Revert, SolError},
};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::{
    chain::{ChainClient, Receipt, SendError, SignedTx},
    error::{Error, Result},
    network::NetworkId,
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Make a JSON-RPC call and return either the raw result or the error object.
async fn raw_call(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<std::result::Result<Value, RpcError>, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let mut body: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = body.get("error") {
        let error: RpcError = serde_json::from_value(error.clone())
            .with_context(|| format!("Malformed {} error", method))?;
        return Ok(Err(error));
    }

    Ok(Ok(body
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null)))
}

/// Make a JSON-RPC call and deserialize the result.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let result = match raw_call(client, url, method, params).await? {
        Ok(value) => value,
        Err(error) if error.message.is_empty() => anyhow::bail!("RPC error: unknown"),
        Err(error) => anyhow::bail!("RPC error: {}", error.message),
    };

    serde_json::from_value(result).with_context(|| format!("Failed to deserialize {} result", method))
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn parse_hex_u64(s: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    /// Absent on pre-Byzantium receipts, which we treat as success.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    gas_used: u64,
}

impl From<RpcReceipt> for Receipt {
    fn from(r: RpcReceipt) -> Self {
        let success = r
            .status
            .as_deref()
            .map(|s| parse_hex_u64(s).is_ok_and(|v| v == 1))
            .unwrap_or(true);

        Self {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            success,
            contract_address: r.contract_address,
            gas_used: r.gas_used,
        }
    }
}

/// [`ChainClient`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        Ok(Self {
            http: create_client()?,
            url,
        })
    }

    /// Connect to `endpoint` and check that it serves the `expected` chain.
    pub async fn connect(endpoint: &str, expected: NetworkId) -> Result<Self> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| Error::rpc(format!("invalid RPC url `{endpoint}`: {e}")))?;
        let client = Self::new(url).map_err(|e| Error::rpc(format!("{e:#}")))?;

        let chain_id = client
            .chain_id()
            .await
            .map_err(|e| Error::rpc(format!("{endpoint}: {e:#}")))?;
        if chain_id != expected.0 {
            return Err(Error::rpc(format!(
                "{endpoint} serves chain {chain_id}, expected {expected}"
            )));
        }

        tracing::debug!(%endpoint, chain_id, "Connected to RPC endpoint");
        Ok(client)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> anyhow::Result<T> {
        json_rpc_call(&self.http, &self.url, method, params).await
    }
}

impl ChainClient for RpcClient {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: String = self.call("eth_chainId", vec![]).await?;
        parse_hex_u64(&id).with_context(|| format!("Invalid chain id `{id}`"))
    }

    async fn transaction_count(&self, account: Address) -> anyhow::Result<u64> {
        let count: String = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(account), serde_json::json!("pending")],
            )
            .await?;
        parse_hex_u64(&count).with_context(|| format!("Invalid transaction count `{count}`"))
    }

    /// Only a JSON-RPC error object is a refusal. Anything else, including an
    /// unreadable answer, leaves the transaction's fate unknown.
    async fn send_raw_transaction(&self, tx: &SignedTx) -> std::result::Result<TxHash, SendError> {
        let outcome = raw_call(
            &self.http,
            &self.url,
            "eth_sendRawTransaction",
            vec![serde_json::json!(tx.raw)],
        )
        .await?;

        match outcome {
            Ok(value) => serde_json::from_value(value)
                .context("Failed to deserialize eth_sendRawTransaction result")
                .map_err(SendError::Transport),
            Err(error) => Err(SendError::Rejected(error.message)),
        }
    }

    async fn transaction_receipt(&self, hash: TxHash) -> anyhow::Result<Option<Receipt>> {
        let receipt: Option<RpcReceipt> = self
            .call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await?;
        Ok(receipt.map(Receipt::from))
    }

    /// Replays the transaction with `eth_call` at `block` and decodes the
    /// revert data the node returns.
    async fn revert_reason(&self, tx: &SignedTx, block: u64) -> Option<String> {
        let mut call = serde_json::json!({
            "from": tx.from,
            "data": tx.request.input,
            "gas": format!("{:#x}", tx.request.gas_limit),
            "gasPrice": format!("{:#x}", tx.request.gas_price),
        });
        if let Some(to) = tx.request.to {
            call["to"] = serde_json::json!(to);
        }

        let outcome = raw_call(
            &self.http,
            &self.url,
            "eth_call",
            vec![call, serde_json::json!(format!("{block:#x}"))],
        )
        .await;

        match outcome {
            Ok(Err(error)) => Some(decode_error(&error)),
            Ok(Ok(_)) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Revert replay failed");
                None
            }
        }
    }
}

/// Prefer the ABI-decoded revert string; fall back to the node's message.
fn decode_error(error: &RpcError) -> String {
    let data = match &error.data {
        Some(Value::String(s)) => s.parse::<Bytes>().ok(),
        Some(Value::Object(obj)) => obj
            .get("data")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Bytes>().ok()),
        _ => None,
    };

    data.and_then(|d| Revert::abi_decode(&d).ok())
        .map(|revert| revert.reason)
        .unwrap_or_else(|| error.message.clone())
}

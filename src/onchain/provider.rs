/// Blockchain data provider boundary
///
/// The aggregator only talks to `ChainDataProvider`, so tests can swap in
/// fakes. `RpcProvider` is the production implementation speaking the
/// provider's JSON-RPC dialect, including the enhanced transfer-history
/// method.
use crate::core::{OnchainError, TransferCategory, UpstreamError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Filter sent to the transfer-history endpoint
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    /// Only transfers sent by this address
    pub from_address: Option<String>,

    /// Only transfers received by this address
    pub to_address: Option<String>,

    /// Inclusive start block
    pub from_block: u64,

    /// Inclusive end block; `None` means the latest block
    pub to_block: Option<u64>,

    /// Transfer categories to include
    pub categories: Vec<TransferCategory>,
}

/// Transfer as returned by the provider, before timestamp enrichment
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    /// Transaction hash
    pub hash: String,

    /// Sender address
    pub from: String,

    /// Recipient address; null for contract creations
    pub to: Option<String>,

    /// Amount in raw provider units; null for some NFT transfers
    pub value: Option<f64>,

    /// Asset symbol, if the provider resolved one
    pub asset: Option<String>,

    /// Transfer category
    pub category: TransferCategory,

    /// Hex block quantity, e.g. "0x1b4"
    pub block_num: String,
}

impl RawTransfer {
    /// Parse the hex block quantity
    pub fn block_number(&self) -> Result<u64, OnchainError> {
        parse_quantity(&self.block_num)
            .ok_or_else(|| OnchainError::Provider(format!("bad block quantity {}", self.block_num)))
    }
}

/// Block header fields the engine needs
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Block number
    pub number: u64,

    /// Unix timestamp in seconds
    pub timestamp: i64,
}

/// Transaction receipt fields the engine needs
#[derive(Debug, Clone)]
pub struct TxReceipt {
    /// Address of the created contract, when the transaction deployed one
    pub contract_address: Option<String>,
}

/// Read-side interface to a blockchain data provider
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Network identifier the provider is connected to,
    /// e.g. "eth-mainnet" or "base-sepolia"
    fn network(&self) -> &str;

    async fn get_asset_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<RawTransfer>, OnchainError>;

    async fn get_block(&self, number: u64) -> Result<BlockHeader, OnchainError>;

    async fn get_code(&self, address: &str) -> Result<String, OnchainError>;

    async fn get_transaction_receipt(
        &self,
        hash: &str,
    ) -> Result<Option<TxReceipt>, OnchainError>;
}

/// JSON-RPC implementation over the provider's HTTP endpoint
#[derive(Debug, Clone)]
pub struct RpcProvider {
    client: reqwest::Client,
    endpoint: String,
    network: String,
}

impl RpcProvider {
    /// Provider for a hosted endpoint of the given network
    pub fn new(network: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("https://{}.g.alchemy.com/v2/{}", network, api_key),
            network: network.to_string(),
        }
    }

    /// Provider for an explicit endpoint URL, used against local nodes
    pub fn with_endpoint(network: &str, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            network: network.to_string(),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, OnchainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            }
            .into());
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Payload(e.to_string()))?;

        if let Some(error) = payload.get("error") {
            return Err(OnchainError::Provider(error.to_string()));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainDataProvider for RpcProvider {
    fn network(&self) -> &str {
        &self.network
    }

    async fn get_asset_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<RawTransfer>, OnchainError> {
        let categories: Vec<&str> = filter.categories.iter().map(|c| c.as_str()).collect();
        let to_block = filter
            .to_block
            .map(|b| format!("{:#x}", b))
            .unwrap_or_else(|| "latest".to_string());

        let mut transfers = Vec::new();
        let mut page_key: Option<String> = None;

        // The transfer endpoint pages at 1000 records
        loop {
            let mut params = json!({
                "fromBlock": format!("{:#x}", filter.from_block),
                "toBlock": to_block,
                "category": categories,
                "excludeZeroValue": false,
                "maxCount": "0x3e8",
            });
            if let Some(from) = &filter.from_address {
                params["fromAddress"] = json!(from);
            }
            if let Some(to) = &filter.to_address {
                params["toAddress"] = json!(to);
            }
            if let Some(key) = &page_key {
                params["pageKey"] = json!(key);
            }

            let result = self
                .rpc("alchemy_getAssetTransfers", json!([params]))
                .await?;

            let page: Vec<RawTransfer> = result
                .get("transfers")
                .map(|t| serde_json::from_value(t.clone()))
                .transpose()
                .map_err(|e| OnchainError::Provider(format!("bad transfer payload: {}", e)))?
                .unwrap_or_default();

            debug!(
                "transfer page: {} records on {}",
                page.len(),
                self.network
            );
            transfers.extend(page);

            page_key = result
                .get("pageKey")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_key.is_none() {
                break;
            }
        }

        Ok(transfers)
    }

    async fn get_block(&self, number: u64) -> Result<BlockHeader, OnchainError> {
        let result = self
            .rpc(
                "eth_getBlockByNumber",
                json!([format!("{:#x}", number), false]),
            )
            .await?;

        if result.is_null() {
            return Err(OnchainError::MissingBlock(number));
        }

        let timestamp = result
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_quantity)
            .ok_or(OnchainError::MissingBlock(number))?;

        Ok(BlockHeader {
            number,
            timestamp: timestamp as i64,
        })
    }

    async fn get_code(&self, address: &str) -> Result<String, OnchainError> {
        let result = self.rpc("eth_getCode", json!([address, "latest"])).await?;
        Ok(result.as_str().unwrap_or("0x").to_string())
    }

    async fn get_transaction_receipt(
        &self,
        hash: &str,
    ) -> Result<Option<TxReceipt>, OnchainError> {
        let result = self.rpc("eth_getTransactionReceipt", json!([hash])).await?;
        if result.is_null() {
            return Ok(None);
        }

        let contract_address = result
            .get("contractAddress")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Some(TxReceipt { contract_address }))
    }
}

/// Parse a 0x-prefixed hex quantity
fn parse_quantity<S: AsRef<str>>(quantity: S) -> Option<u64> {
    let quantity = quantity.as_ref();
    let digits = quantity.strip_prefix("0x").unwrap_or(quantity);
    u64::from_str_radix(digits, 16).ok()
}

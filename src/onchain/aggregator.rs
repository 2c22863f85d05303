/// On-chain history aggregation and contract discovery
///
/// Walks a user's transfer history across their tracked addresses and
/// discovers the contracts they deployed, deriving per-contract usage
/// metrics. Every provider call runs under the exponential backoff
/// schedule; a call that exhausts its budget fails the whole operation.
/// The one finer-grained recovery point is per-contract metric
/// computation, which degrades a single contract to a zero-valued record
/// instead of aborting the batch.
use crate::client::{with_backoff, BackoffPolicy};
use crate::core::{DeployedContract, OnchainError, Transfer, TransferCategory};
use crate::onchain::provider::{ChainDataProvider, RawTransfer, TransferFilter};
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Networks whose transfer index cannot serve the `internal` category.
/// Base mainnet shares the limitation with the test networks.
const BASE_MAINNET: &str = "base-mainnet";

/// Aggregates wallet history and deployment metrics from one provider
pub struct OnchainAggregator {
    provider: Arc<dyn ChainDataProvider>,
    backoff: BackoffPolicy,
    /// Block timestamps repeat heavily across transfers; cache lookups
    block_timestamps: DashMap<u64, i64>,
}

impl OnchainAggregator {
    pub fn new(provider: Arc<dyn ChainDataProvider>) -> Self {
        Self::with_backoff(provider, BackoffPolicy::default())
    }

    pub fn with_backoff(provider: Arc<dyn ChainDataProvider>, backoff: BackoffPolicy) -> Self {
        Self {
            provider,
            backoff,
            block_timestamps: DashMap::new(),
        }
    }

    /// Whether the connected network is a test network
    pub fn is_testnet(&self) -> bool {
        self.provider.network().contains("sepolia")
    }

    /// Whether the address currently holds contract code
    pub async fn is_contract(&self, address: &str) -> Result<bool, OnchainError> {
        let code = with_backoff(self.backoff, "get_code", || async move {
            self.provider.get_code(address).await
        })
        .await?;
        Ok(!code.is_empty() && code != "0x")
    }

    /// Categories the connected network can serve
    fn transfer_categories(&self) -> Vec<TransferCategory> {
        let network = self.provider.network();
        let mut categories = vec![
            TransferCategory::External,
            TransferCategory::Erc1155,
            TransferCategory::Erc20,
            TransferCategory::Erc721,
        ];
        if !(network.contains("sepolia") || network == BASE_MAINNET) {
            categories.push(TransferCategory::Internal);
        }
        categories
    }

    /// Full transfer history for a set of addresses, both directions,
    /// flat-concatenated without dedup or ordering
    #[instrument(skip(self, addresses), fields(network = self.provider.network()))]
    pub async fn history_for_addresses(
        &self,
        addresses: &[String],
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<Transfer>, OnchainError> {
        let categories = self.transfer_categories();
        let mut history = Vec::new();

        for address in addresses {
            let outgoing = TransferFilter {
                from_address: Some(address.clone()),
                from_block,
                to_block,
                categories: categories.clone(),
                ..TransferFilter::default()
            };
            let incoming = TransferFilter {
                to_address: Some(address.clone()),
                from_block,
                to_block,
                categories: categories.clone(),
                ..TransferFilter::default()
            };

            for filter in [outgoing, incoming] {
                let raw = self.fetch_transfers(&filter).await?;
                for transfer in raw {
                    if let Some(enriched) = self.enrich(transfer).await? {
                        history.push(enriched);
                    }
                }
            }
        }

        info!(
            "aggregated {} transfers across {} addresses",
            history.len(),
            addresses.len()
        );
        Ok(history)
    }

    /// Contracts deployed by an address in a block range, with usage
    /// metrics per contract
    #[instrument(skip(self))]
    pub async fn contracts_deployed_by(
        &self,
        deployer: &str,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Vec<DeployedContract>, OnchainError> {
        let filter = TransferFilter {
            from_address: Some(deployer.to_string()),
            from_block: start_block,
            to_block: end_block,
            categories: vec![TransferCategory::External],
            ..TransferFilter::default()
        };
        let transfers = self.fetch_transfers(&filter).await?;

        // A creation transaction has no recipient
        let creations: Vec<&RawTransfer> =
            transfers.iter().filter(|t| t.to.is_none()).collect();
        if creations.is_empty() {
            debug!("no creation transactions for {} in range", deployer);
            return Ok(Vec::new());
        }

        let mut discovered: Vec<(String, u64)> = Vec::new();
        for creation in creations {
            let block_number = match creation.block_number() {
                Ok(number) => number,
                Err(err) => {
                    debug!("skipping creation {}: {}", creation.hash, err);
                    continue;
                }
            };
            let receipt = self.fetch_receipt(&creation.hash).await?;
            if let Some(address) = receipt.and_then(|r| r.contract_address) {
                discovered.push((address, block_number));
            }
        }

        let is_testnet = self.is_testnet();
        let metrics = discovered.into_iter().map(|(address, block_number)| async move {
            match self.contract_metrics(&address, block_number).await {
                Ok(contract) => contract,
                Err(err) => {
                    warn!(
                        "metrics for contract {} failed ({}), keeping zero-valued record",
                        address, err
                    );
                    DeployedContract::with_failed_metrics(address, block_number, is_testnet)
                }
            }
        });

        let contracts = join_all(metrics).await;
        info!("{} contracts deployed by {}", contracts.len(), deployer);
        Ok(contracts)
    }

    /// Usage metrics for one contract: deployment date, distinct inbound
    /// senders, raw-unit TVL, inbound transfer count
    async fn contract_metrics(
        &self,
        address: &str,
        block_number: u64,
    ) -> Result<DeployedContract, OnchainError> {
        let deployed_at = self.block_timestamp(block_number).await?;

        let inbound = self
            .fetch_transfers(&TransferFilter {
                to_address: Some(address.to_string()),
                from_block: block_number,
                to_block: None,
                categories: vec![TransferCategory::External, TransferCategory::Erc20],
                ..TransferFilter::default()
            })
            .await?;

        let unique_users = inbound
            .iter()
            .map(|t| t.from.to_lowercase())
            .collect::<HashSet<_>>()
            .len() as u64;
        let tvl: f64 = inbound.iter().filter_map(|t| t.value).sum();

        Ok(DeployedContract {
            address: address.to_string(),
            block_number,
            deployment_date: format_timestamp(deployed_at),
            unique_users,
            tvl: tvl.to_string(),
            total_transactions: inbound.len() as u64,
            is_testnet: self.is_testnet(),
        })
    }

    /// Attach a block timestamp; drops the record when the header has no
    /// usable timestamp
    async fn enrich(&self, raw: RawTransfer) -> Result<Option<Transfer>, OnchainError> {
        let block_number = match raw.block_number() {
            Ok(number) => number,
            Err(err) => {
                debug!("dropping transfer {}: {}", raw.hash, err);
                return Ok(None);
            }
        };

        let timestamp = self.block_timestamp(block_number).await?;
        Ok(Some(Transfer {
            hash: raw.hash,
            from: raw.from,
            to: raw.to,
            value: raw.value.unwrap_or(0.0),
            asset: raw.asset,
            category: raw.category,
            block_number,
            timestamp: format_timestamp(timestamp),
        }))
    }

    async fn block_timestamp(&self, number: u64) -> Result<i64, OnchainError> {
        if let Some(cached) = self.block_timestamps.get(&number) {
            return Ok(*cached);
        }

        let header = with_backoff(self.backoff, "get_block", || async move {
            self.provider.get_block(number).await
        })
        .await?;

        self.block_timestamps.insert(number, header.timestamp);
        Ok(header.timestamp)
    }

    async fn fetch_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<RawTransfer>, OnchainError> {
        with_backoff(self.backoff, "get_asset_transfers", || async move {
            self.provider.get_asset_transfers(filter).await
        })
        .await
    }

    async fn fetch_receipt(
        &self,
        hash: &str,
    ) -> Result<Option<crate::onchain::provider::TxReceipt>, OnchainError> {
        with_backoff(self.backoff, "get_transaction_receipt", || async move {
            self.provider.get_transaction_receipt(hash).await
        })
        .await
    }
}

/// Render a unix timestamp the way downstream consumers display it
fn format_timestamp(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

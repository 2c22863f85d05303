/// Per-request analysis orchestration
///
/// One request pulls the off-chain and on-chain sides concurrently and
/// joins them into a single user bundle. The caller owns persistence of
/// the report.
use crate::core::{AnalysisReport, OnchainError, UserData};
use crate::github::GithubAggregator;
use crate::onchain::OnchainAggregator;
use anyhow::{Context, Result};
use tokio::time::{timeout, Duration};
use tracing::{info, instrument};

/// One analysis request from the controller layer
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// GitHub login to aggregate; empty skips the off-chain side
    pub github_username: String,

    /// Wallet addresses to aggregate
    pub addresses: Vec<String>,

    /// Inclusive start block for on-chain history
    pub from_block: u64,

    /// Inclusive end block; `None` means the latest block
    pub to_block: Option<u64>,
}

/// Pipeline tuning
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    /// Overall deadline per analysis request; `None` disables it
    pub analysis_timeout: Option<Duration>,
}

/// Runs analysis requests end to end
pub struct AnalysisPipeline {
    onchain: OnchainAggregator,
    github: GithubAggregator,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(onchain: OnchainAggregator, github: GithubAggregator) -> Self {
        Self::with_config(onchain, github, PipelineConfig::default())
    }

    pub fn with_config(
        onchain: OnchainAggregator,
        github: GithubAggregator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            onchain,
            github,
            config,
        }
    }

    /// Aggregate everything for one user
    #[instrument(skip(self, request), fields(user = %request.github_username))]
    pub async fn analyze_user(&self, request: &AnalyzeRequest) -> Result<AnalysisReport> {
        match self.config.analysis_timeout {
            Some(deadline) => timeout(deadline, self.run(request))
                .await
                .context("analysis deadline exceeded")?,
            None => self.run(request).await,
        }
    }

    async fn run(&self, request: &AnalyzeRequest) -> Result<AnalysisReport> {
        let offchain = async {
            if request.github_username.is_empty() {
                Ok(None)
            } else {
                self.github
                    .aggregate(&request.github_username)
                    .await
                    .map(Some)
            }
        };

        let onchain = async {
            let history = self
                .onchain
                .history_for_addresses(&request.addresses, request.from_block, request.to_block)
                .await?;
            let mut contracts = Vec::new();
            for address in &request.addresses {
                contracts.extend(
                    self.onchain
                        .contracts_deployed_by(address, request.from_block, request.to_block)
                        .await?,
                );
            }
            Ok::<_, OnchainError>((history, contracts))
        };

        // Both sides run concurrently and join before scoring can start
        let (offchain, onchain) = tokio::join!(offchain, onchain);
        let bundle = offchain.context("off-chain aggregation failed")?;
        let (history, contracts) = onchain.context("on-chain aggregation failed")?;

        let mut data = UserData {
            onchain_history: history,
            contracts_deployed: contracts,
            ..UserData::default()
        };
        if let Some(bundle) = bundle {
            data.profile = Some(bundle.profile);
            data.repositories = bundle.repositories;
            data.organizations = bundle.organizations;
            data.contributions = bundle.contributions;
            data.calendar = bundle.calendar;
        }

        info!(
            "analysis complete: {} transfers, {} contracts, {} repos",
            data.onchain_history.len(),
            data.contracts_deployed.len(),
            data.repositories.repos.len()
        );

        Ok(AnalysisReport {
            success: true,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ContributionCalendar, ContributionStats, GithubError, GithubProfile, Organization,
        RepoDetail,
    };
    use crate::github::api::{GithubApi, PublicEvent};
    use crate::onchain::provider::{
        BlockHeader, ChainDataProvider, RawTransfer, TransferFilter, TxReceipt,
    };
    use crate::core::TransferCategory;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct StubProvider {
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ChainDataProvider for StubProvider {
        fn network(&self) -> &str {
            "eth-mainnet"
        }

        async fn get_asset_transfers(
            &self,
            filter: &TransferFilter,
        ) -> Result<Vec<RawTransfer>, OnchainError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if filter.from_address.as_deref() == Some("0xalice")
                && filter.categories.len() == 5
            {
                Ok(vec![RawTransfer {
                    hash: "0x1".to_string(),
                    from: "0xalice".to_string(),
                    to: Some("0xbob".to_string()),
                    value: Some(1.0),
                    asset: Some("ETH".to_string()),
                    category: TransferCategory::External,
                    block_num: "0x10".to_string(),
                }])
            } else {
                Ok(Vec::new())
            }
        }

        async fn get_block(&self, number: u64) -> Result<BlockHeader, OnchainError> {
            Ok(BlockHeader {
                number,
                timestamp: 1_700_000_000,
            })
        }

        async fn get_code(&self, _address: &str) -> Result<String, OnchainError> {
            Ok("0x".to_string())
        }

        async fn get_transaction_receipt(
            &self,
            _hash: &str,
        ) -> Result<Option<TxReceipt>, OnchainError> {
            Ok(None)
        }
    }

    struct StubApi;

    #[async_trait]
    impl GithubApi for StubApi {
        async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError> {
            Ok(GithubProfile {
                login: username.to_string(),
                ..GithubProfile::default()
            })
        }

        async fn fetch_repo_page(
            &self,
            _username: &str,
            _page: usize,
        ) -> Result<Vec<RepoDetail>, GithubError> {
            Ok(Vec::new())
        }

        async fn fetch_languages(
            &self,
            _full_name: &str,
        ) -> Result<HashMap<String, u64>, GithubError> {
            Ok(HashMap::new())
        }

        async fn fetch_organizations(
            &self,
            _username: &str,
        ) -> Result<Vec<Organization>, GithubError> {
            Ok(Vec::new())
        }

        async fn fetch_event_page(
            &self,
            _username: &str,
            _page: usize,
        ) -> Result<Vec<PublicEvent>, GithubError> {
            Ok(Vec::new())
        }

        async fn fetch_contribution_calendar(
            &self,
            _username: &str,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<ContributionCalendar, GithubError> {
            Ok(ContributionCalendar::default())
        }
    }

    fn pipeline(delay: Option<Duration>, config: PipelineConfig) -> AnalysisPipeline {
        let provider = Arc::new(StubProvider { delay }) as Arc<dyn ChainDataProvider>;
        let api = Arc::new(StubApi) as Arc<dyn GithubApi>;
        AnalysisPipeline::with_config(
            OnchainAggregator::new(provider),
            GithubAggregator::new(api),
            config,
        )
    }

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            github_username: "octocat".to_string(),
            addresses: vec!["0xalice".to_string()],
            from_block: 0,
            to_block: None,
        }
    }

    #[tokio::test]
    async fn both_sides_join_into_one_bundle() {
        let report = pipeline(None, PipelineConfig::default())
            .analyze_user(&request())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.data.profile.unwrap().login, "octocat");
        assert_eq!(report.data.onchain_history.len(), 1);
        assert!(report.data.contracts_deployed.is_empty());
    }

    #[tokio::test]
    async fn empty_username_skips_the_offchain_side() {
        let mut req = request();
        req.github_username = String::new();

        let report = pipeline(None, PipelineConfig::default())
            .analyze_user(&req)
            .await
            .unwrap();

        assert!(report.data.profile.is_none());
        assert_eq!(report.data.onchain_history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_off_a_stalled_analysis() {
        let config = PipelineConfig {
            analysis_timeout: Some(Duration::from_secs(5)),
        };
        let result = pipeline(Some(Duration::from_secs(60)), config)
            .analyze_user(&request())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn contribution_stats_default_when_feed_is_quiet() {
        let report = pipeline(None, PipelineConfig::default())
            .analyze_user(&request())
            .await
            .unwrap();
        let stats: &ContributionStats = &report.data.contributions;
        assert_eq!(stats.total_commits, 0);
        assert!(stats.by_repository.is_empty());
    }
}

/// Dollar valuation of a builder's track record
///
/// A linear model over the same underlying metrics the score uses,
/// split into experience, skill and influence components per side.
/// Unlike scoring, a failed run leaves no marker in the store; the
/// error only propagates.
use crate::config::{resolve_config, ScoreConfig, WorthMultipliers};
use crate::core::{DeveloperWorth, ScoringError, UserData, WorthBreakdown, WorthDetails};
use crate::scoring::engine::{
    account_age_years, crypto_contributions, DEFAULT_CONFIG_NAME,
};
use crate::storage::UserStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Per-side component values
struct SideWorth {
    experience: f64,
    skill: f64,
    influence: f64,
}

impl SideWorth {
    fn total(&self) -> f64 {
        self.experience + self.skill + self.influence
    }
}

/// Computes and persists developer worth estimates
pub struct WorthEngine {
    store: Arc<dyn UserStore>,
}

impl WorthEngine {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Compute and persist the worth estimate for one user. The outcome
    /// is observable only through the store.
    #[instrument(skip(self))]
    pub async fn calculate_developer_worth(&self, user_id: &str) -> Result<(), ScoringError> {
        let user = self
            .store
            .load_user(user_id)
            .await?
            .ok_or_else(|| ScoringError::UserNotFound(user_id.to_string()))?;

        let stored = self.store.load_score_config(DEFAULT_CONFIG_NAME).await?;
        let config = resolve_config(stored.as_ref(), ScoreConfig::default());

        let data = user.data.clone().unwrap_or_default();
        let web3 = web3_worth(&data, &config);
        let web2 = web2_worth(&data, &config.worth_multipliers);

        let worth = DeveloperWorth {
            user_id: user.user_id,
            total_worth: web3.total() + web2.total(),
            breakdown: WorthBreakdown {
                web3_worth: web3.total(),
                web2_worth: web2.total(),
            },
            details: WorthDetails {
                experience_value: web3.experience + web2.experience,
                skill_value: web3.skill + web2.skill,
                influence_value: web3.influence + web2.influence,
            },
            last_calculated_at: Utc::now(),
        };

        self.store.upsert_worth(&worth).await?;
        info!(
            "worth for {}: ${:.2} (web3 ${:.2}, web2 ${:.2})",
            user_id,
            worth.total_worth,
            worth.breakdown.web3_worth,
            worth.breakdown.web2_worth
        );
        Ok(())
    }
}

fn web3_worth(data: &UserData, config: &ScoreConfig) -> SideWorth {
    let m = &config.worth_multipliers.web3;
    let contracts = &data.contracts_deployed;

    let mainnet = contracts.iter().filter(|c| !c.is_testnet).count() as f64;
    let testnet = contracts.iter().filter(|c| c.is_testnet).count() as f64;
    let (crypto_total, _) = crypto_contributions(&data.contributions, &config.crypto_repos);
    let experience = mainnet * m.per_mainnet_contract
        + testnet * m.per_testnet_contract
        + crypto_total * m.per_crypto_contribution;

    let skill: f64 = m
        .per_language_unit
        .iter()
        .filter_map(|(language, dollars)| {
            data.repositories
                .language_totals
                .get(language)
                .map(|size| *size as f64 * dollars)
        })
        .sum();

    let tvl: f64 = contracts
        .iter()
        .filter_map(|c| c.tvl.parse::<f64>().ok())
        .sum();
    let unique_users: f64 = contracts.iter().map(|c| c.unique_users as f64).sum();
    let transactions: f64 = contracts.iter().map(|c| c.total_transactions as f64).sum();
    let influence =
        tvl * m.per_tvl_unit + unique_users * m.per_unique_user + transactions * m.per_transaction;

    SideWorth {
        experience,
        skill,
        influence,
    }
}

fn web2_worth(data: &UserData, multipliers: &WorthMultipliers) -> SideWorth {
    let m = &multipliers.web2;
    let profile = data.profile.as_ref();

    let age_years = profile.map(account_age_years).unwrap_or(0.0);
    let experience = age_years * m.per_account_year
        + data.contributions.total_pull_requests as f64 * m.per_pull_request
        + data.calendar.total_contributions as f64 * m.per_contribution;

    let loc: f64 = data
        .repositories
        .language_totals
        .values()
        .map(|size| *size as f64)
        .sum();
    let skill = loc * m.per_code_unit;

    let influence = data.repositories.total_stars as f64 * m.per_star
        + data.repositories.total_forks as f64 * m.per_fork
        + profile.map(|p| p.followers as f64).unwrap_or(0.0) * m.per_follower;

    SideWorth {
        experience,
        skill,
        influence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoredScoreConfig;
    use crate::core::{DeployedContract, RepositorySummary, UserRecord};
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn store_with_user(data: Option<UserData>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let record = UserRecord {
            user_id: "u1".to_string(),
            github_username: "octocat".to_string(),
            addresses: vec!["0xalice".to_string()],
            hackathon_wins: 0,
            data,
        };
        store.save_user(record).await.unwrap();
        store
    }

    fn mainnet_contract(tvl: &str, users: u64, txs: u64) -> DeployedContract {
        DeployedContract {
            address: "0xc1".to_string(),
            block_number: 1,
            deployment_date: "2025-01-01T00:00:00+00:00".to_string(),
            unique_users: users,
            tvl: tvl.to_string(),
            total_transactions: txs,
            is_testnet: false,
        }
    }

    #[tokio::test]
    async fn worth_follows_the_linear_model() {
        let mut repositories = RepositorySummary {
            total_stars: 100,
            total_forks: 10,
            ..RepositorySummary::default()
        };
        repositories
            .language_totals
            .insert("Solidity".to_string(), 1_000);

        let data = UserData {
            contracts_deployed: vec![mainnet_contract("1000", 50, 200)],
            repositories,
            ..UserData::default()
        };
        let store = store_with_user(Some(data)).await;

        let engine = WorthEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);
        engine.calculate_developer_worth("u1").await.unwrap();

        let worth = store.load_worth("u1").await.unwrap().unwrap();

        // web3: 1 mainnet contract * 500 + solidity 1000 * 0.1
        //       + 1000 tvl * 0.001 + 50 users * 2 + 200 txs * 0.05
        let web3_expected = 500.0 + 100.0 + 1.0 + 100.0 + 10.0;
        // web2: 1000 loc * 0.01 + 100 stars * 2 + 10 forks * 3
        let web2_expected = 10.0 + 200.0 + 30.0;
        assert_eq!(worth.breakdown.web3_worth, web3_expected);
        assert_eq!(worth.breakdown.web2_worth, web2_expected);
        assert_eq!(worth.total_worth, web3_expected + web2_expected);

        // Component details sum both sides
        assert_eq!(worth.details.experience_value, 500.0);
        assert_eq!(worth.details.skill_value, 100.0 + 10.0);
        assert_eq!(worth.details.influence_value, 111.0 + 230.0);
    }

    #[tokio::test]
    async fn malformed_multiplier_blob_does_not_fail_the_run() {
        let data = UserData {
            repositories: RepositorySummary {
                total_stars: 10,
                ..RepositorySummary::default()
            },
            ..UserData::default()
        };
        let store = store_with_user(Some(data)).await;
        store.put_config(
            DEFAULT_CONFIG_NAME,
            StoredScoreConfig {
                developer_worth_multipliers: Some(json!("certainly {not} json")),
                ..StoredScoreConfig::default()
            },
        );

        let engine = WorthEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);
        engine.calculate_developer_worth("u1").await.unwrap();

        let worth = store.load_worth("u1").await.unwrap().unwrap();
        // Default per-star multiplier applies
        assert_eq!(worth.breakdown.web2_worth, 20.0);
    }

    #[tokio::test]
    async fn missing_user_propagates_without_a_failure_marker() {
        let store = Arc::new(MemoryStore::new());
        let engine = WorthEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);

        let err = engine.calculate_developer_worth("ghost").await.unwrap_err();
        assert!(matches!(err, ScoringError::UserNotFound(_)));
        assert!(store.load_worth("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_bundle_is_worth_nothing() {
        let store = store_with_user(None).await;
        let engine = WorthEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);
        engine.calculate_developer_worth("u1").await.unwrap();

        let worth = store.load_worth("u1").await.unwrap().unwrap();
        assert_eq!(worth.total_worth, 0.0);
    }
}

/// Weighted score computation
///
/// Every metric follows the same normalization law: the raw value is
/// clamped at its threshold and scaled by its weight. Absent data
/// scores from zero instead of failing. A scoring run that errors for
/// any reason records a failed-status result before the error
/// propagates, so pollers always observe a terminal state.
use crate::config::{resolve_config, ScoreConfig, WEB3_LANGUAGES};
use crate::core::{
    ContributionStats, MetricScore, ScoreResult, ScoreStatus, ScoringError, UserData, UserRecord,
    Web2Metrics, Web3Metrics,
};
use crate::storage::UserStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Name of the configuration record scoring runs resolve
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Computes and persists user scores
pub struct ScoreEngine {
    store: Arc<dyn UserStore>,
}

impl ScoreEngine {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Compute and persist the score for one user. The outcome is
    /// observable only through the store.
    #[instrument(skip(self))]
    pub async fn calculate_user_score(&self, user_id: &str) -> Result<(), ScoringError> {
        match self.score_user(user_id).await {
            Ok(result) => {
                self.store.upsert_score(&result).await?;
                info!(
                    "scored {}: total {:.1} (web2 {:.1}, web3 {:.1})",
                    user_id,
                    result.total_score,
                    result.web2.as_ref().map(|m| m.total).unwrap_or(0.0),
                    result.web3.as_ref().map(|m| m.total).unwrap_or(0.0),
                );
                Ok(())
            }
            Err(err) => {
                error!("scoring {} failed: {}", user_id, err);
                // Record the failure before the error surfaces
                let failed = ScoreResult::failed(user_id.to_string());
                if let Err(write_err) = self.store.upsert_score(&failed).await {
                    error!(
                        "could not record failed status for {}: {}",
                        user_id, write_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn score_user(&self, user_id: &str) -> Result<ScoreResult, ScoringError> {
        let user = self
            .store
            .load_user(user_id)
            .await?
            .ok_or_else(|| ScoringError::UserNotFound(user_id.to_string()))?;

        let stored = self.store.load_score_config(DEFAULT_CONFIG_NAME).await?;
        let config = resolve_config(stored.as_ref(), ScoreConfig::default());
        if !config.weights_follow_convention() {
            warn!(
                "weight tables deviate from the 100-per-side convention (web3 {}, web2 {})",
                config.web3_weights.sum(),
                config.web2_weights.sum()
            );
        }

        let data = user.data.clone().unwrap_or_default();
        let web3 = score_web3(&user, &data, &config);
        let web2 = score_web2(&data, &config);
        let total_score = (web3.total + web2.total) / 2.0;

        Ok(ScoreResult {
            user_id: user.user_id,
            total_score,
            web2: Some(web2),
            web3: Some(web3),
            status: ScoreStatus::Completed,
            last_calculated_at: Utc::now(),
        })
    }
}

fn score_web3(user: &UserRecord, data: &UserData, config: &ScoreConfig) -> Web3Metrics {
    let contracts = &data.contracts_deployed;
    let mainnet = contracts.iter().filter(|c| !c.is_testnet).count() as f64;
    let testnet = contracts.iter().filter(|c| c.is_testnet).count() as f64;
    let tvl: f64 = contracts
        .iter()
        .filter_map(|c| c.tvl.parse::<f64>().ok())
        .sum();
    let unique_users: f64 = contracts.iter().map(|c| c.unique_users as f64).sum();
    let contract_transactions: u64 = contracts.iter().map(|c| c.total_transactions).sum();
    let transactions = (data.onchain_history.len() as u64 + contract_transactions) as f64;
    let web3_loc = web3_language_units(&data.repositories.language_totals);
    let (crypto_total, crypto_breakdown) =
        crypto_contributions(&data.contributions, &config.crypto_repos);
    let hackathons = user.hackathon_wins as f64;

    let t = &config.web3_thresholds;
    let w = &config.web3_weights;
    let mut metrics = Web3Metrics {
        mainnet_contracts: MetricScore::rate(mainnet, t.mainnet_contracts, w.mainnet_contracts),
        testnet_contracts: MetricScore::rate(testnet, t.testnet_contracts, w.testnet_contracts),
        tvl: MetricScore::rate(tvl, t.tvl, w.tvl),
        unique_users: MetricScore::rate(unique_users, t.unique_users, w.unique_users),
        transactions: MetricScore::rate(transactions, t.transactions, w.transactions),
        web3_languages: MetricScore::rate(web3_loc, t.web3_languages, w.web3_languages),
        crypto_contributions: MetricScore::rate(
            crypto_total,
            t.crypto_contributions,
            w.crypto_contributions,
        )
        .with_breakdown(crypto_breakdown),
        hackathon_wins: MetricScore::rate(hackathons, t.hackathon_wins, w.hackathon_wins),
        total: 0.0,
    };
    metrics.total = metrics.mainnet_contracts.score
        + metrics.testnet_contracts.score
        + metrics.tvl.score
        + metrics.unique_users.score
        + metrics.transactions.score
        + metrics.web3_languages.score
        + metrics.crypto_contributions.score
        + metrics.hackathon_wins.score;
    metrics
}

fn score_web2(data: &UserData, config: &ScoreConfig) -> Web2Metrics {
    let profile = data.profile.as_ref();
    let followers = profile.map(|p| p.followers as f64).unwrap_or(0.0);
    let age_years = profile.map(account_age_years).unwrap_or(0.0);
    let loc: f64 = data
        .repositories
        .language_totals
        .values()
        .map(|size| *size as f64)
        .sum();

    let t = &config.web2_thresholds;
    let w = &config.web2_weights;
    let mut metrics = Web2Metrics {
        pull_requests: MetricScore::rate(
            data.contributions.total_pull_requests as f64,
            t.pull_requests,
            w.pull_requests,
        ),
        contributions: MetricScore::rate(
            data.calendar.total_contributions as f64,
            t.contributions,
            w.contributions,
        ),
        forks: MetricScore::rate(data.repositories.total_forks as f64, t.forks, w.forks),
        stars: MetricScore::rate(data.repositories.total_stars as f64, t.stars, w.stars),
        issues: MetricScore::rate(data.contributions.total_issues as f64, t.issues, w.issues),
        lines_of_code: MetricScore::rate(loc, t.lines_of_code, w.lines_of_code),
        account_age: MetricScore::rate(age_years, t.account_age, w.account_age),
        followers: MetricScore::rate(followers, t.followers, w.followers),
        total: 0.0,
    };
    metrics.total = metrics.pull_requests.score
        + metrics.contributions.score
        + metrics.forks.score
        + metrics.stars.score
        + metrics.issues.score
        + metrics.lines_of_code.score
        + metrics.account_age.score
        + metrics.followers.score;
    metrics
}

/// Contribution counts against the curated repository list. The
/// returned breakdown holds matched repositories only.
pub(crate) fn crypto_contributions(
    stats: &ContributionStats,
    crypto_repos: &[String],
) -> (f64, HashMap<String, u64>) {
    let mut breakdown = HashMap::new();
    let mut total = 0u64;
    for repo in crypto_repos {
        if let Some(contribution) = stats.by_repository.get(repo) {
            let count = contribution.total();
            if count > 0 {
                breakdown.insert(repo.clone(), count);
                total += count;
            }
        }
    }
    (total as f64, breakdown)
}

/// Code units across the languages that count as on-chain work
pub(crate) fn web3_language_units(language_totals: &HashMap<String, u64>) -> f64 {
    WEB3_LANGUAGES
        .iter()
        .filter_map(|language| language_totals.get(*language))
        .map(|size| *size as f64)
        .sum()
}

/// Account age in years
pub(crate) fn account_age_years(profile: &crate::core::GithubProfile) -> f64 {
    profile
        .created_at
        .map(|created| (Utc::now() - created).num_days() as f64 / 365.25)
        .unwrap_or(0.0)
        .max(0.0)
}

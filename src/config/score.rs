/// Scoring configuration structures
///
/// A persisted config is partial: any missing key falls back to the
/// shipped default, so the resolved config is always total over the
/// fixed metric key set. The worth-multiplier table additionally
/// tolerates being stored as a JSON-encoded string and falls back to
/// defaults when it cannot be parsed.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Languages that count toward the on-chain language metric
pub const WEB3_LANGUAGES: [&str; 4] = ["Solidity", "Rust", "Move", "Cadence"];

/// Per-metric table for the on-chain side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Web3MetricTable {
    pub mainnet_contracts: f64,
    pub testnet_contracts: f64,
    pub tvl: f64,
    pub unique_users: f64,
    pub transactions: f64,
    pub web3_languages: f64,
    pub crypto_contributions: f64,
    pub hackathon_wins: f64,
}

impl Web3MetricTable {
    pub fn sum(&self) -> f64 {
        self.mainnet_contracts
            + self.testnet_contracts
            + self.tvl
            + self.unique_users
            + self.transactions
            + self.web3_languages
            + self.crypto_contributions
            + self.hackathon_wins
    }
}

/// Per-metric table for the off-chain side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Web2MetricTable {
    pub pull_requests: f64,
    pub contributions: f64,
    pub forks: f64,
    pub stars: f64,
    pub issues: f64,
    pub lines_of_code: f64,
    pub account_age: f64,
    pub followers: f64,
}

impl Web2MetricTable {
    pub fn sum(&self) -> f64 {
        self.pull_requests
            + self.contributions
            + self.forks
            + self.stars
            + self.issues
            + self.lines_of_code
            + self.account_age
            + self.followers
    }
}

/// Partially specified on-chain table as persisted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialWeb3Table {
    pub mainnet_contracts: Option<f64>,
    pub testnet_contracts: Option<f64>,
    pub tvl: Option<f64>,
    pub unique_users: Option<f64>,
    pub transactions: Option<f64>,
    pub web3_languages: Option<f64>,
    pub crypto_contributions: Option<f64>,
    pub hackathon_wins: Option<f64>,
}

impl PartialWeb3Table {
    fn over(&self, base: Web3MetricTable) -> Web3MetricTable {
        Web3MetricTable {
            mainnet_contracts: self.mainnet_contracts.unwrap_or(base.mainnet_contracts),
            testnet_contracts: self.testnet_contracts.unwrap_or(base.testnet_contracts),
            tvl: self.tvl.unwrap_or(base.tvl),
            unique_users: self.unique_users.unwrap_or(base.unique_users),
            transactions: self.transactions.unwrap_or(base.transactions),
            web3_languages: self.web3_languages.unwrap_or(base.web3_languages),
            crypto_contributions: self
                .crypto_contributions
                .unwrap_or(base.crypto_contributions),
            hackathon_wins: self.hackathon_wins.unwrap_or(base.hackathon_wins),
        }
    }
}

/// Partially specified off-chain table as persisted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialWeb2Table {
    pub pull_requests: Option<f64>,
    pub contributions: Option<f64>,
    pub forks: Option<f64>,
    pub stars: Option<f64>,
    pub issues: Option<f64>,
    pub lines_of_code: Option<f64>,
    pub account_age: Option<f64>,
    pub followers: Option<f64>,
}

impl PartialWeb2Table {
    fn over(&self, base: Web2MetricTable) -> Web2MetricTable {
        Web2MetricTable {
            pull_requests: self.pull_requests.unwrap_or(base.pull_requests),
            contributions: self.contributions.unwrap_or(base.contributions),
            forks: self.forks.unwrap_or(base.forks),
            stars: self.stars.unwrap_or(base.stars),
            issues: self.issues.unwrap_or(base.issues),
            lines_of_code: self.lines_of_code.unwrap_or(base.lines_of_code),
            account_age: self.account_age.unwrap_or(base.account_age),
            followers: self.followers.unwrap_or(base.followers),
        }
    }
}

/// Dollar multipliers for the on-chain worth model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Web3WorthMultipliers {
    pub per_mainnet_contract: f64,
    pub per_testnet_contract: f64,
    pub per_crypto_contribution: f64,
    /// Dollar per code unit, per language
    pub per_language_unit: HashMap<String, f64>,
    pub per_tvl_unit: f64,
    pub per_unique_user: f64,
    pub per_transaction: f64,
}

impl Default for Web3WorthMultipliers {
    fn default() -> Self {
        let mut per_language_unit = HashMap::new();
        per_language_unit.insert("Solidity".to_string(), 0.1);
        per_language_unit.insert("Rust".to_string(), 0.05);
        per_language_unit.insert("Move".to_string(), 0.08);
        per_language_unit.insert("Cadence".to_string(), 0.08);
        Self {
            per_mainnet_contract: 500.0,
            per_testnet_contract: 50.0,
            per_crypto_contribution: 20.0,
            per_language_unit,
            per_tvl_unit: 0.001,
            per_unique_user: 2.0,
            per_transaction: 0.05,
        }
    }
}

/// Dollar multipliers for the off-chain worth model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Web2WorthMultipliers {
    pub per_account_year: f64,
    pub per_pull_request: f64,
    pub per_contribution: f64,
    pub per_code_unit: f64,
    pub per_star: f64,
    pub per_fork: f64,
    pub per_follower: f64,
}

impl Default for Web2WorthMultipliers {
    fn default() -> Self {
        Self {
            per_account_year: 100.0,
            per_pull_request: 10.0,
            per_contribution: 1.0,
            per_code_unit: 0.01,
            per_star: 2.0,
            per_fork: 3.0,
            per_follower: 1.0,
        }
    }
}

/// Both sides of the worth model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorthMultipliers {
    pub web3: Web3WorthMultipliers,
    pub web2: Web2WorthMultipliers,
}

impl WorthMultipliers {
    /// Parse a persisted multiplier blob. The blob may be an object or a
    /// JSON-encoded string; anything unparseable falls back to the
    /// default table.
    pub fn from_stored(stored: Option<&Value>) -> Self {
        let Some(stored) = stored else {
            return Self::default();
        };

        let parsed = match stored {
            Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        };

        match parsed {
            Ok(multipliers) => multipliers,
            Err(err) => {
                warn!(
                    "worth multipliers unparseable ({}), using default table",
                    err
                );
                Self::default()
            }
        }
    }
}

/// Score configuration as persisted: everything optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredScoreConfig {
    pub name: String,
    pub version: u32,
    pub web3_thresholds: PartialWeb3Table,
    pub web3_weights: PartialWeb3Table,
    pub web2_thresholds: PartialWeb2Table,
    pub web2_weights: PartialWeb2Table,

    /// Object or JSON-encoded string; parsed defensively
    pub developer_worth_multipliers: Option<Value>,

    pub crypto_repos: Option<Vec<String>>,
}

impl StoredScoreConfig {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// Fully resolved score configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub name: String,
    pub version: u32,
    pub web3_thresholds: Web3MetricTable,
    pub web3_weights: Web3MetricTable,
    pub web2_thresholds: Web2MetricTable,
    pub web2_weights: Web2MetricTable,
    pub worth_multipliers: WorthMultipliers,
    pub crypto_repos: Vec<String>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            version: 1,
            web3_thresholds: Web3MetricTable {
                mainnet_contracts: 5.0,
                testnet_contracts: 10.0,
                tvl: 100_000.0,
                unique_users: 500.0,
                transactions: 1_000.0,
                web3_languages: 50_000.0,
                crypto_contributions: 100.0,
                hackathon_wins: 5.0,
            },
            web3_weights: Web3MetricTable {
                mainnet_contracts: 20.0,
                testnet_contracts: 5.0,
                tvl: 15.0,
                unique_users: 15.0,
                transactions: 10.0,
                web3_languages: 15.0,
                crypto_contributions: 15.0,
                hackathon_wins: 5.0,
            },
            web2_thresholds: Web2MetricTable {
                pull_requests: 100.0,
                contributions: 1_000.0,
                forks: 200.0,
                stars: 500.0,
                issues: 100.0,
                lines_of_code: 500_000.0,
                account_age: 5.0,
                followers: 500.0,
            },
            web2_weights: Web2MetricTable {
                pull_requests: 15.0,
                contributions: 15.0,
                forks: 10.0,
                stars: 20.0,
                issues: 10.0,
                lines_of_code: 10.0,
                account_age: 10.0,
                followers: 10.0,
            },
            worth_multipliers: WorthMultipliers::default(),
            crypto_repos: default_crypto_repos(),
        }
    }
}

impl ScoreConfig {
    /// Whether both weight tables follow the sums-to-100 convention
    pub fn weights_follow_convention(&self) -> bool {
        (self.web3_weights.sum() - 100.0).abs() < f64::EPSILON
            && (self.web2_weights.sum() - 100.0).abs() < f64::EPSILON
    }
}

/// Curated repositories whose contributions count as crypto work
fn default_crypto_repos() -> Vec<String> {
    [
        "bitcoin/bitcoin",
        "ethereum/go-ethereum",
        "ethereum/solidity",
        "ethereum/EIPs",
        "OpenZeppelin/openzeppelin-contracts",
        "foundry-rs/foundry",
        "paradigmxyz/reth",
        "Uniswap/v3-core",
        "solana-labs/solana",
        "aptos-labs/aptos-core",
        "MystenLabs/sui",
        "onflow/cadence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Resolve a persisted config over the defaults. Persisted keys win;
/// every missing key keeps its default, so the result is total.
pub fn resolve_config(stored: Option<&StoredScoreConfig>, defaults: ScoreConfig) -> ScoreConfig {
    let Some(stored) = stored else {
        return defaults;
    };

    ScoreConfig {
        name: if stored.name.is_empty() {
            defaults.name
        } else {
            stored.name.clone()
        },
        version: if stored.version == 0 {
            defaults.version
        } else {
            stored.version
        },
        web3_thresholds: stored.web3_thresholds.over(defaults.web3_thresholds),
        web3_weights: stored.web3_weights.over(defaults.web3_weights),
        web2_thresholds: stored.web2_thresholds.over(defaults.web2_thresholds),
        web2_weights: stored.web2_weights.over(defaults.web2_weights),
        worth_multipliers: WorthMultipliers::from_stored(
            stored.developer_worth_multipliers.as_ref(),
        ),
        crypto_repos: stored
            .crypto_repos
            .clone()
            .unwrap_or(defaults.crypto_repos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn default_weights_sum_to_100_per_side() {
        let config = ScoreConfig::default();
        assert_eq!(config.web3_weights.sum(), 100.0);
        assert_eq!(config.web2_weights.sum(), 100.0);
        assert!(config.weights_follow_convention());
    }

    #[test]
    fn resolve_without_stored_config_keeps_defaults() {
        let resolved = resolve_config(None, ScoreConfig::default());
        assert_eq!(resolved, ScoreConfig::default());
    }

    #[test]
    fn resolve_merges_every_missing_key() {
        let stored = StoredScoreConfig {
            name: "default".to_string(),
            web2_thresholds: PartialWeb2Table {
                stars: Some(250.0),
                ..PartialWeb2Table::default()
            },
            ..StoredScoreConfig::default()
        };

        let resolved = resolve_config(Some(&stored), ScoreConfig::default());
        let defaults = ScoreConfig::default();

        // The overridden key wins, everything else keeps its default
        assert_eq!(resolved.web2_thresholds.stars, 250.0);
        assert_eq!(
            resolved.web2_thresholds.pull_requests,
            defaults.web2_thresholds.pull_requests
        );
        assert_eq!(resolved.web3_thresholds, defaults.web3_thresholds);
        assert_eq!(resolved.web3_weights, defaults.web3_weights);
        assert_eq!(resolved.crypto_repos, defaults.crypto_repos);
    }

    #[test]
    fn malformed_multiplier_string_falls_back_to_defaults() {
        let stored = StoredScoreConfig {
            developer_worth_multipliers: Some(json!("{not json at all")),
            ..StoredScoreConfig::default()
        };

        let resolved = resolve_config(Some(&stored), ScoreConfig::default());
        assert_eq!(resolved.worth_multipliers, WorthMultipliers::default());
    }

    #[test]
    fn multiplier_string_and_object_forms_both_parse() {
        let as_object = StoredScoreConfig {
            developer_worth_multipliers: Some(json!({"web2": {"per_star": 9.0}})),
            ..StoredScoreConfig::default()
        };
        let as_string = StoredScoreConfig {
            developer_worth_multipliers: Some(json!(
                "{\"web2\": {\"per_star\": 9.0}}"
            )),
            ..StoredScoreConfig::default()
        };

        for stored in [as_object, as_string] {
            let resolved = resolve_config(Some(&stored), ScoreConfig::default());
            assert_eq!(resolved.worth_multipliers.web2.per_star, 9.0);
            // Unspecified multiplier keys keep their defaults
            assert_eq!(
                resolved.worth_multipliers.web2.per_fork,
                Web2WorthMultipliers::default().per_fork
            );
            assert_eq!(
                resolved.worth_multipliers.web3,
                Web3WorthMultipliers::default()
            );
        }
    }

    #[test]
    fn loads_partial_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({
                "name": "default",
                "web3_weights": {"mainnet_contracts": 30.0}
            })
        )
        .unwrap();

        let stored = StoredScoreConfig::load_from_file(file.path().to_str().unwrap()).unwrap();
        let resolved = resolve_config(Some(&stored), ScoreConfig::default());

        assert_eq!(resolved.web3_weights.mainnet_contracts, 30.0);
        assert_eq!(resolved.web3_weights.tvl, 15.0);
    }
}

/// Core data types for the reputation aggregation and scoring engine
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Asset transfer category tracked by the blockchain data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferCategory {
    /// Plain value transfer between externally owned accounts
    External,

    /// Trace-level transfer produced by contract execution
    Internal,

    /// Fungible token transfer
    Erc20,

    /// NFT transfer
    Erc721,

    /// Multi-token standard transfer
    Erc1155,
}

impl TransferCategory {
    /// Wire name expected by the provider's transfer filter
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferCategory::External => "external",
            TransferCategory::Internal => "internal",
            TransferCategory::Erc20 => "erc20",
            TransferCategory::Erc721 => "erc721",
            TransferCategory::Erc1155 => "erc1155",
        }
    }
}

/// A directional asset movement observed on chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Transaction hash
    pub hash: String,

    /// Sender address
    pub from: String,

    /// Recipient address; empty for contract creation transactions
    pub to: Option<String>,

    /// Transferred amount in raw provider units
    pub value: f64,

    /// Asset symbol reported by the provider, if any
    pub asset: Option<String>,

    /// Transfer category
    pub category: TransferCategory,

    /// Block the transfer landed in
    pub block_number: u64,

    /// Human-readable block timestamp, resolved by a secondary lookup.
    /// Never empty on records returned from aggregation.
    pub timestamp: String,
}

/// A contract deployed by a tracked address, with derived usage metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedContract {
    /// Contract address from the creation receipt
    pub address: String,

    /// Block of the creation transaction
    pub block_number: u64,

    /// Human-readable deployment timestamp; empty when metric
    /// computation for this contract failed
    pub deployment_date: String,

    /// Count of distinct addresses that transferred into the contract
    pub unique_users: u64,

    /// Sum of inbound transfer values in raw provider units
    pub tvl: String,

    /// Count of inbound transfers
    pub total_transactions: u64,

    /// Whether the contract lives on a test network
    pub is_testnet: bool,
}

impl DeployedContract {
    /// Zero-valued record used when metric computation for a single
    /// contract fails. The batch keeps its length; only this entry
    /// degrades.
    pub fn with_failed_metrics(address: String, block_number: u64, is_testnet: bool) -> Self {
        Self {
            address,
            block_number,
            deployment_date: String::new(),
            unique_users: 0,
            tvl: "0".to_string(),
            total_transactions: 0,
            is_testnet,
        }
    }
}

/// GitHub account profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubProfile {
    /// Account login
    pub login: String,

    /// Display name
    pub name: Option<String>,

    /// Profile bio
    pub bio: Option<String>,

    /// Avatar image URL
    pub avatar_url: Option<String>,

    /// Follower count
    pub followers: u64,

    /// Following count
    pub following: u64,

    /// Public repository count
    pub public_repos: u64,

    /// Account creation time
    pub created_at: Option<DateTime<Utc>>,
}

/// Per-repository detail record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDetail {
    /// Repository name
    pub name: String,

    /// owner/name form used to key contributions
    pub full_name: String,

    /// Repository description
    pub description: Option<String>,

    /// Star count
    pub stargazers_count: u64,

    /// Fork count
    pub forks_count: u64,

    /// Primary language reported by the listing endpoint
    pub language: Option<String>,

    /// Per-language code size, raw provider units. Filled by a separate
    /// per-repository fetch after the listing page.
    #[serde(default)]
    pub languages: HashMap<String, u64>,

    /// Whether this repository is itself a fork
    pub fork: bool,

    /// Repository home URL
    pub html_url: Option<String>,
}

/// Aggregated repository metrics for one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySummary {
    /// Stars summed across all repositories
    pub total_stars: u64,

    /// Forks summed across all repositories
    pub total_forks: u64,

    /// Per-language code size summed across all repositories
    pub language_totals: HashMap<String, u64>,

    /// Per-repository detail records
    pub repos: Vec<RepoDetail>,
}

/// GitHub organization membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Organization login
    pub login: String,

    /// Avatar image URL
    pub avatar_url: Option<String>,

    /// Organization description
    pub description: Option<String>,
}

/// Contribution counts against a single repository
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RepoContribution {
    /// Commits pushed
    pub commits: u64,

    /// Pull requests opened
    pub pull_requests: u64,

    /// Issues opened
    pub issues: u64,

    /// Review comments left
    pub reviews: u64,
}

impl RepoContribution {
    /// Combined contribution count for allow-list matching
    pub fn total(&self) -> u64 {
        self.commits + self.pull_requests + self.issues + self.reviews
    }
}

/// Contribution statistics derived from the public event feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContributionStats {
    /// Total commits pushed
    pub total_commits: u64,

    /// Total pull requests opened
    pub total_pull_requests: u64,

    /// Total issues opened
    pub total_issues: u64,

    /// Total review comments
    pub total_reviews: u64,

    /// Per-repository contribution counts keyed by full name
    pub by_repository: HashMap<String, RepoContribution>,
}

/// One day of the contribution calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionDay {
    /// Calendar date, YYYY-MM-DD
    pub date: String,

    /// Contribution count for the day
    pub count: u64,
}

/// Day-by-day contribution heatmap for a fixed window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContributionCalendar {
    /// Total contributions inside the window
    pub total_contributions: u64,

    /// Daily counts
    pub days: Vec<ContributionDay>,
}

/// Merged per-user data bundle produced by one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserData {
    /// GitHub account profile; absent when the account could not be
    /// resolved
    pub profile: Option<GithubProfile>,

    /// Aggregated repository metrics
    pub repositories: RepositorySummary,

    /// Organization memberships
    pub organizations: Vec<Organization>,

    /// Event-feed contribution statistics
    pub contributions: ContributionStats,

    /// Contribution calendar window
    pub calendar: ContributionCalendar,

    /// Flat transfer history across all tracked addresses
    pub onchain_history: Vec<Transfer>,

    /// Contracts deployed by the tracked addresses
    pub contracts_deployed: Vec<DeployedContract>,
}

/// Result envelope returned to the controller layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Whether the analysis run completed
    pub success: bool,

    /// The merged bundle
    pub data: UserData,
}

/// Persisted user row the scoring operations read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable user id assigned by the platform
    pub user_id: String,

    /// GitHub login to aggregate
    pub github_username: String,

    /// Wallet addresses to aggregate
    pub addresses: Vec<String>,

    /// Hackathon wins entered by the platform; read-only here
    pub hackathon_wins: u64,

    /// Last attached analysis bundle
    pub data: Option<UserData>,
}

/// One scored metric: raw input, saturation threshold, point weight and
/// the resulting score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Raw input value
    pub value: f64,

    /// Input value at which the metric saturates
    pub threshold: f64,

    /// Points awarded at saturation
    pub weight: f64,

    /// Awarded points
    pub score: f64,

    /// Sparse sub-metric detail; only populated for metrics that match
    /// against a curated list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<HashMap<String, u64>>,
}

impl MetricScore {
    /// Score a raw value against a threshold and weight. The value is
    /// clamped at the threshold, so the score never exceeds the weight.
    pub fn rate(value: f64, threshold: f64, weight: f64) -> Self {
        let ratio = if threshold > 0.0 {
            (value / threshold).min(1.0)
        } else {
            0.0
        };
        Self {
            value,
            threshold,
            weight,
            score: ratio * weight,
            breakdown: None,
        }
    }

    /// Attach a sparse breakdown map
    pub fn with_breakdown(mut self, breakdown: HashMap<String, u64>) -> Self {
        self.breakdown = Some(breakdown);
        self
    }
}

/// Scored on-chain metric set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Web3Metrics {
    pub mainnet_contracts: MetricScore,
    pub testnet_contracts: MetricScore,
    pub tvl: MetricScore,
    pub unique_users: MetricScore,
    pub transactions: MetricScore,
    pub web3_languages: MetricScore,
    pub crypto_contributions: MetricScore,
    pub hackathon_wins: MetricScore,

    /// Sum of the individual metric scores
    pub total: f64,
}

/// Scored GitHub metric set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Web2Metrics {
    pub pull_requests: MetricScore,
    pub contributions: MetricScore,
    pub forks: MetricScore,
    pub stars: MetricScore,
    pub issues: MetricScore,
    pub lines_of_code: MetricScore,
    pub account_age: MetricScore,
    pub followers: MetricScore,

    /// Sum of the individual metric scores
    pub total: f64,
}

/// Terminal state of a scoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoreStatus {
    Completed,
    Failed,
}

/// Persisted scoring output, fully overwritten on recomputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// User this score belongs to
    pub user_id: String,

    /// Mean of the two side totals
    pub total_score: f64,

    /// GitHub side breakdown; absent on failed runs
    pub web2: Option<Web2Metrics>,

    /// On-chain side breakdown; absent on failed runs
    pub web3: Option<Web3Metrics>,

    /// Terminal state of the run
    pub status: ScoreStatus,

    /// When the run finished
    pub last_calculated_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Record persisted when scoring fails, before the error propagates
    pub fn failed(user_id: String) -> Self {
        Self {
            user_id,
            total_score: 0.0,
            web2: None,
            web3: None,
            status: ScoreStatus::Failed,
            last_calculated_at: Utc::now(),
        }
    }
}

/// Side totals of the worth estimate
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorthBreakdown {
    /// Dollar value attributed to on-chain activity
    pub web3_worth: f64,

    /// Dollar value attributed to GitHub activity
    pub web2_worth: f64,
}

/// Component values of the worth estimate, summed across both sides
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorthDetails {
    /// Value from track record: contracts shipped, tenure, volume of
    /// contributions
    pub experience_value: f64,

    /// Value from code written, weighted per language
    pub skill_value: f64,

    /// Value from adoption: TVL, users, stars, followers
    pub influence_value: f64,
}

/// Persisted dollar valuation, fully overwritten on recomputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeveloperWorth {
    /// User this estimate belongs to
    pub user_id: String,

    /// Sum of both side totals
    pub total_worth: f64,

    /// Per-side totals
    pub breakdown: WorthBreakdown,

    /// Component values across both sides
    pub details: WorthDetails,

    /// When the estimate was computed
    pub last_calculated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_clamps_at_threshold() {
        let over = MetricScore::rate(250.0, 100.0, 10.0);
        assert_eq!(over.score, 10.0);

        let under = MetricScore::rate(50.0, 100.0, 10.0);
        assert_eq!(under.score, 5.0);
    }

    #[test]
    fn rate_is_monotone_and_bounded() {
        let mut last = -1.0;
        for value in [0.0, 1.0, 10.0, 99.0, 100.0, 1000.0] {
            let m = MetricScore::rate(value, 100.0, 25.0);
            assert!(m.score >= last);
            assert!(m.score <= m.weight);
            last = m.score;
        }
    }

    #[test]
    fn rate_handles_zero_threshold() {
        let m = MetricScore::rate(42.0, 0.0, 10.0);
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn failed_contract_record_is_zero_valued() {
        let c = DeployedContract::with_failed_metrics("0xabc".to_string(), 7, false);
        assert_eq!(c.unique_users, 0);
        assert_eq!(c.tvl, "0");
        assert_eq!(c.total_transactions, 0);
        assert_eq!(c.deployment_date, "");
    }
}

/// Off-chain (source hosting) data aggregation

pub mod aggregator;
pub mod api;

pub use aggregator::{GithubAggregator, GithubBundle};
pub use api::{GithubApi, GithubClient, PublicEvent};

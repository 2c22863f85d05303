/// Error taxonomy for the aggregation and scoring engine
use thiserror::Error;

/// Upstream HTTP failure, surfaced after the client's retry budget is
/// spent. Fatal to the enclosing aggregation call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("still rate limited after retry: {url}")]
    RateLimited { url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed upstream payload: {0}")]
    Payload(String),
}

/// On-chain aggregation failure
#[derive(Debug, Error)]
pub enum OnchainError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("provider returned no block header for block {0}")]
    MissingBlock(u64),

    #[error("provider error: {0}")]
    Provider(String),
}

/// GitHub aggregation failure
#[derive(Debug, Error)]
pub enum GithubError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("malformed GitHub payload: {0}")]
    Payload(String),
}

/// Persistence boundary failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Scoring run failure. Any variant is persisted as a failed-status
/// result before it propagates.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("user {0} has no record")]
    UserNotFound(String),
}

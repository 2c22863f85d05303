/// HTTP plumbing shared by the upstream aggregators

pub mod fetch;
pub mod retry;

pub use fetch::{FetchConfig, RateLimitedClient};
pub use retry::{with_backoff, BackoffPolicy};

// Core types and errors
pub mod core;

// HTTP plumbing and retry policies
pub mod client;

// Engine configuration
pub mod config;

// Upstream aggregators
pub mod github;
pub mod onchain;

// Orchestration, scoring and persistence boundary
pub mod pipeline;
pub mod scoring;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::*;
pub use crate::pipeline::{AnalysisPipeline, AnalyzeRequest, PipelineConfig};
pub use crate::scoring::{ScoreEngine, WorthEngine};
pub use crate::storage::{MemoryStore, UserStore};

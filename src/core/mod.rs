/// Core types and errors shared across the engine

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// Score and worth computation

pub mod engine;
pub mod worth;

pub use engine::{ScoreEngine, DEFAULT_CONFIG_NAME};
pub use worth::WorthEngine;

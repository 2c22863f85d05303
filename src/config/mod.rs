/// Engine configuration

pub mod score;

pub use score::{
    resolve_config, PartialWeb2Table, PartialWeb3Table, ScoreConfig, StoredScoreConfig,
    Web2MetricTable, Web2WorthMultipliers, Web3MetricTable, Web3WorthMultipliers,
    WorthMultipliers, WEB3_LANGUAGES,
};

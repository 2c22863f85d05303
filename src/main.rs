use anyhow::{bail, Context, Result};
use beaver::client::{FetchConfig, RateLimitedClient};
use beaver::config::StoredScoreConfig;
use beaver::github::{GithubAggregator, GithubClient};
use beaver::onchain::{OnchainAggregator, RpcProvider};
use beaver::pipeline::{AnalysisPipeline, AnalyzeRequest, PipelineConfig};
use beaver::scoring::{ScoreEngine, WorthEngine, DEFAULT_CONFIG_NAME};
use beaver::storage::{MemoryStore, UserStore};
use beaver::UserRecord;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all("logs")?;

    // Create file appender for logs
    let file_appender = tracing_appender::rolling::daily("logs", "beaver.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);

    // Create console layer with formatting
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    // Create file layer with JSON formatting
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    // Initialize subscriber with both console and file layers
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Leak the guard to prevent the file appender from being dropped
    std::mem::forget(_guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing()?;

    info!("🦫 Beaver Reputation Engine - Analysis Controller");
    info!("=================================================");

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("usage: beaver <github-username> [wallet-address...]");
    }
    let github_username = args[1].clone();
    let addresses: Vec<String> = args[2..].to_vec();

    let network = std::env::var("CHAIN_NETWORK").unwrap_or_else(|_| "eth-mainnet".to_string());
    let api_key = std::env::var("ALCHEMY_API_KEY")
        .context("ALCHEMY_API_KEY is required to reach the chain data provider")?;
    let github_token = std::env::var("GITHUB_TOKEN").ok();
    if github_token.is_none() {
        warn!("GITHUB_TOKEN not set, running against the unauthenticated rate limit");
    }

    let analysis_timeout = std::env::var("ANALYSIS_TIMEOUT_SECS")
        .ok()
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs);

    // Wire the aggregation pipeline
    let provider = Arc::new(RpcProvider::new(&network, &api_key));
    let onchain = OnchainAggregator::new(provider);

    let fetch_client = RateLimitedClient::new(FetchConfig::default());
    let github_api = Arc::new(GithubClient::new(fetch_client, github_token));
    let github = GithubAggregator::new(github_api);

    let pipeline = AnalysisPipeline::with_config(
        onchain,
        github,
        PipelineConfig { analysis_timeout },
    );

    // The store stands in for the surrounding application's persistence
    let store = Arc::new(MemoryStore::new());
    if let Ok(path) = std::env::var("SCORE_CONFIG_PATH") {
        let config = StoredScoreConfig::load_from_file(&path)
            .with_context(|| format!("failed to load score config from {}", path))?;
        store.put_config(DEFAULT_CONFIG_NAME, config);
        info!("score config loaded from {}", path);
    }

    let user_id = github_username.clone();
    store
        .save_user(UserRecord {
            user_id: user_id.clone(),
            github_username: github_username.clone(),
            addresses: addresses.clone(),
            hackathon_wins: 0,
            data: None,
        })
        .await?;

    info!(
        "🔍 Analyzing {} across {} addresses on {}",
        github_username,
        addresses.len(),
        network
    );

    let request = AnalyzeRequest {
        github_username,
        addresses,
        from_block: 0,
        to_block: None,
    };
    let report = match pipeline.analyze_user(&request).await {
        Ok(report) => report,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return Err(e);
        }
    };
    store.attach_analysis(&user_id, report.data).await?;

    // Score and worth write through the store; read the persisted state
    // back to report the outcome
    let score_engine = ScoreEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);
    score_engine.calculate_user_score(&user_id).await?;

    let worth_engine = WorthEngine::new(Arc::clone(&store) as Arc<dyn UserStore>);
    worth_engine.calculate_developer_worth(&user_id).await?;

    if let Some(score) = store.load_score(&user_id).await? {
        info!("📊 Total score: {:.1} ({:?})", score.total_score, score.status);
        if let Some(web2) = &score.web2 {
            info!("   Web2 side: {:.1}", web2.total);
        }
        if let Some(web3) = &score.web3 {
            info!("   Web3 side: {:.1}", web3.total);
        }
    }
    if let Some(worth) = store.load_worth(&user_id).await? {
        info!(
            "💰 Developer worth: ${:.2} (web3 ${:.2}, web2 ${:.2})",
            worth.total_worth, worth.breakdown.web3_worth, worth.breakdown.web2_worth
        );
    }

    info!("✅ Analysis complete");
    Ok(())
}

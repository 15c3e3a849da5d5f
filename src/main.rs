use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use syncflo::api::{AppState, routes};
use syncflo::assistant::{Assistant, ChatHistoryStore};
use syncflo::config::DashboardConfig;
use syncflo::draft::{DraftConfig, DraftGenerator};
use syncflo::error::Result;
use syncflo::feed::{EmailSource, EmailStore, FeedClient, spawn_feed_refresher};
use syncflo::llm::create_provider;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = DashboardConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export GEMINI_API_KEY=...");
        std::process::exit(1);
    });

    eprintln!("📬 SyncFlo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Feed: {}", config.feed.url);
    eprintln!("   Refresh: every {}s", config.feed.refresh_interval.as_secs());
    eprintln!("   API: http://0.0.0.0:{}/api", config.server.port);

    let llm = create_provider(&config.llm)?;

    // ── Feed ────────────────────────────────────────────────────────────
    let source: Arc<dyn EmailSource> = Arc::new(FeedClient::new(&config.feed)?);
    let store = EmailStore::new();
    let shutdown = CancellationToken::new();
    let refresher = spawn_feed_refresher(
        Arc::clone(&source),
        Arc::clone(&store),
        config.feed.refresh_interval,
        shutdown.clone(),
    );

    // ── Assistant ───────────────────────────────────────────────────────
    let history = match &config.server.history_path {
        Some(path) => {
            eprintln!("   Chat history: {}", path.display());
            ChatHistoryStore::load(path).await?
        }
        None => {
            eprintln!("   Chat history: in memory");
            ChatHistoryStore::in_memory()
        }
    };

    let state = AppState {
        store,
        source,
        drafts: Arc::new(DraftGenerator::new(llm.clone(), DraftConfig::default())),
        assistant: Arc::new(Assistant::new(llm, history)),
    };

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;
    tracing::info!(port = config.server.port, "Dashboard API started");

    let signal = shutdown.clone();
    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    refresher.await.ok();
    tracing::info!("SyncFlo stopped");
    Ok(())
}

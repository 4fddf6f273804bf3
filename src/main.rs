use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavindex::api::{self, AppState};
use wavindex::config;
use wavindex::llm;
use wavindex::pipeline::Pipeline;
use wavindex::remote::{FtpSessionFactory, SessionFactory};
use wavindex::search::SearchEngine;
use wavindex::state::ScanState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavindex=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let config_path = config::get_config_path();
    let app_config = config::load_config(&config_path).map_err(|e| anyhow!(e))?;
    tracing::info!("Server will listen on {}", app_config.get_bind_address());

    let factory = Arc::new(FtpSessionFactory::new(app_config.ftp.clone()).context("invalid ftp settings")?);
    tracing::info!("Remote server: {}", factory.describe());

    let pipeline = Pipeline::new(&app_config, factory, Arc::new(ScanState::new()));
    let transformer = llm::from_config(&app_config.llm)?;

    let state = Arc::new(AppState {
        config: app_config.clone(),
        pipeline,
        index: Arc::new(SearchEngine::new()),
        transformer,
    });

    // Initial crawl and index / 初始扫描与索引
    match api::scan::refresh_index(&state).await {
        Ok(outcome) if outcome.degraded => {
            tracing::warn!("Started in offline mode with {} cached files", outcome.records.len())
        }
        Ok(outcome) if outcome.cancelled => tracing::warn!("Initial scan stopped early"),
        Ok(outcome) => tracing::info!("Indexed {} files", outcome.records.len()),
        Err(e) => tracing::error!("Initial scan failed: {}", e),
    }

    let app = api::router(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

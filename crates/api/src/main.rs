use tracing::info;
use tracing_subscriber::EnvFilter;

use subtext_api::{bootstrap, build_router, state::AppState};
use subtext_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    let oracle = bootstrap::build_oracle(&config)?;
    let cache = bootstrap::build_cache(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, oracle, cache);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "subtext api listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

use anyhow::{Context, Result};
use riskchain::db::{schema, Db};
use riskchain::http::{self, AppState};
use riskchain::{Config, Engine};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.riskchain.log_level.as_str()),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(config).await?,
        "migrate" => run_schema_setup(&config).await?,
        "verify" => run_verification(&config).await?,
        other => anyhow::bail!("Unknown command '{}'. Expected one of: serve, migrate, verify", other),
    }

    Ok(())
}

/// Serve `POST /v1/reason` and `GET /health`
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting riskchain HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let backends = config.open_backends().await?;
    let engine = Engine::new(backends, config.engine_settings());
    let health = engine.health().await;
    if health.status != "ok" {
        log::warn!(
            "Backends degraded at startup (graph healthy: {}, index healthy: {})",
            health.graph_healthy,
            health.index_healthy
        );
    }

    let embedder = config.embedder()?.map(Arc::new);
    if embedder.is_none() {
        log::info!("No [embeddings] section: query_text is disabled, send query_vector instead");
    }

    let state = AppState::new(
        Arc::new(engine),
        embedder,
        config.embedding_retries(),
        config.http_server.allowed_origins.clone(),
    );
    http::serve(state, config.http_server.port).await?;
    Ok(())
}

/// Create or upgrade the graph schema in `backend.db_path`
async fn run_schema_setup(config: &Config) -> Result<()> {
    let db = Db::new(config.db_path());
    let status = db
        .with_connection(|conn| schema::ensure_schema(conn))
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;
    log::info!("Graph schema v{} ready at {}", status.version, config.db_path().display());
    Ok(())
}

/// Load the configured backends and report their health
async fn run_verification(config: &Config) -> Result<()> {
    log::info!("Starting riskchain v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Backend: {:?} (metric {:?})", config.backend.kind, config.backend.metric);
    if let Some(embeddings) = &config.embeddings {
        log::info!("Embedding model: {}", embeddings.model);
    }

    let backends = config.open_backends().await?;
    let engine = Engine::new(backends, config.engine_settings());
    let health = engine.health().await;

    log::info!(
        "Vector index: {} embeddings of dimension {}",
        health.index_size,
        health.index_dimension
    );
    if !health.graph_healthy {
        anyhow::bail!("Graph backend is not healthy");
    }
    if !health.index_healthy {
        anyhow::bail!("Vector index is not healthy");
    }
    if health.index_size == 0 {
        log::warn!("Vector index is empty: reasoning will run graph-only");
    }

    log::info!("✓ Backend verification complete");
    Ok(())
}

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use conkg_core::AppConfig;
use conkg_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("conkg=info".parse()?))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    let addr = config.bind_addr();

    let graph = conkg_graph::graph_store_from_config(&config).await;
    if let Err(e) = graph.ensure_schema().await {
        tracing::warn!(error = %e, "Could not ensure graph schema");
    }
    let vector = conkg_vector::vector_store_from_config(&config)?;
    let embedder = conkg_vector::embedder_from_config(&config)?;

    tracing::info!(
        graph = graph.backend(),
        vector = vector.backend(),
        embedder = embedder.name(),
        data_dir = %config.data_dir.display(),
        "Backends ready"
    );

    let app = build_router(AppState::new(config, graph, vector, embedder));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Construction knowledge graph server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

//! MCP server initialization for stdio and SSE transports.
//!
//! Provides [`serve_stdio`] and [`serve_sse`] entry points that build the
//! recommendation service and wire it into a running MCP server.

use crate::config::KencotConfig;
use crate::service::RecommendationService;
use crate::tools::KencotTools;
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: load the catalog, open the stores, pick the embedding path.
/// The service is wrapped in an Arc so every MCP session shares one engine.
fn setup_service(config: &KencotConfig) -> Result<Arc<RecommendationService>> {
    let service = RecommendationService::build(config).context("failed to start recommendation service")?;
    tracing::info!(
        embedding = %service.embedding_path(),
        items = service.catalog().len(),
        "service ready"
    );
    Ok(Arc::new(service))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: KencotConfig) -> Result<()> {
    tracing::info!("starting Kencot MCP server on stdio");

    let service = setup_service(&config)?;

    let tools = KencotTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: KencotConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting Kencot MCP server on SSE/HTTP");

    let service = setup_service(&config)?;

    let mcp = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(KencotTools::new(service.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", mcp);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    Ok(())
}

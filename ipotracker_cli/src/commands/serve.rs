//! The `serve` subcommand: expose the queries over HTTP.

use anyhow::Result;
use ipotracker_lib::{open_router, PipelineConfig};

pub async fn run(config: &PipelineConfig) -> Result<()> {
    let app = open_router(config.database_path.clone())?;
    let listener = tokio::net::TcpListener::bind(config.query_addr).await?;
    tracing::info!(addr = %config.query_addr, db = %config.database_path.display(), "Query service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    tracing::info!("Query service stopped");
    Ok(())
}

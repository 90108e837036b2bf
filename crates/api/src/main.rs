use std::env;

use anyhow::{Context, Result};
use datewise_api::build_app;
use datewise_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("datewise_api");

    let bind = env::var("DATEWISE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let app = build_app()?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "datewise api started");

    axum::serve(listener, app).await?;
    Ok(())
}

/// API сервер MSME BI

use std::sync::Arc;

use anyhow::Context;

use msme_bi::api::{router, AppState};

const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = std::env::var("MSME_BI_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let app = router(Arc::new(AppState::default()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

//! # fisc-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use fisc_api::state::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok();
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, API authentication is disabled");
    }
    let config = AppConfig { port, auth_token };

    let pool = fisc_engine::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = fisc_api::bootstrap::bootstrap(config, pool)
        .await
        .map_err(|e| {
            tracing::error!("Bootstrap failed: {e}");
            e
        })?;

    let app = fisc_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("fisc-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

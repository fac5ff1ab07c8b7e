use std::net::SocketAddr;

use anyhow::Context;
use jwt_service::config::load_service_config;
use jwt_service::{router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_service_config()?;
    let state = AppState::from_config(&config)?;
    let app = router(state);

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("HOST must be an IP address, got '{}'", config.host))?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting jwt-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

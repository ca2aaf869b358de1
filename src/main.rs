mod config;

use axum::http::HeaderValue;
use clap::Parser as _;
use config::Config;
use relais::{AppState, RelayConfig, build_router};
use tokio::net::TcpListener;
use tracing::{info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting chat relay with config: {:?}", config);

    let allowed_origin: HeaderValue = config
        .allowed_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid allowed origin '{}': {}", config.allowed_origin, e))?;

    let relay = RelayConfig::builder()
        .upstream_url(config.upstream_url.clone())
        .allowed_origin(allowed_origin)
        .build();

    let app_state = AppState::new(relay);
    let router = build_router(app_state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Chat relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}

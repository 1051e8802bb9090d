use anyhow::Result;
use dotenvy::dotenv;
use otter_connector::{create_router, ApiState, OtterConnectorConfig};
use shared::telemetry::{self, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("otter-connector");
    telemetry::init_telemetry(telemetry_config)?;

    info!("Starting Otter Connector");

    let config = OtterConnectorConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    if config.encryption_key.is_none() {
        info!("OTTER_ENCRYPTION_KEY not set, sealed passwords are disabled");
    }

    let api_state = ApiState::from_config(&config)?;
    let app = create_router(api_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("HTTP server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server stopped: {:?}", e);
    }

    Ok(())
}

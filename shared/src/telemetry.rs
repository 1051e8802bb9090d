use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_filter: String,
    pub json_logs: bool,
}

impl TelemetryConfig {
    pub fn from_env(service_name: &str) -> Self {
        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let json_logs = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            service_name: service_name.to_string(),
            log_filter,
            json_logs,
        }
    }
}

pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }

    info!(
        "Telemetry initialized for {} (filter: {})",
        config.service_name, config.log_filter
    );
    Ok(())
}

pub mod middleware {
    use axum::{extract::Request, middleware::Next, response::Response};
    use std::time::Instant;
    use tracing::{info, warn};

    /// Logs one line per request with method, path, status and latency.
    pub async fn trace_layer(request: Request, next: Next) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let started = Instant::now();

        let response = next.run(request).await;

        let status = response.status();
        let latency_ms = started.elapsed().as_millis();
        if status.is_server_error() {
            warn!(%method, %path, status = status.as_u16(), latency_ms, "request failed");
        } else {
            info!(%method, %path, status = status.as_u16(), latency_ms, "request handled");
        }

        response
    }
}

//! vitals-gateway server binary.
//!
//! Serves the health-telemetry API surface with the full request pipeline.
//! Route handlers for the data endpoints are provided by the application;
//! this binary mounts them as placeholders that answer 501 once a request
//! has passed quota, authentication and validation.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::routing::{get, post};
use clap::Parser;
use tokio::net::TcpListener;

use vitals_gateway::config;
use vitals_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use vitals_gateway::observability::{init_logging, metrics};
use vitals_gateway::pipeline::routes;
use vitals_gateway::{GatewayError, HttpServer};

#[derive(Parser)]
#[command(name = "vitals-gateway", version, about = "Health-telemetry API gateway")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

async fn pending() -> GatewayError {
    GatewayError::internal("no handler attached to this route").with_status(StatusCode::NOT_IMPLEMENTED)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        "vitals-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = ?config.listener.request_timeout_secs,
        quota_enabled = config.quota.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::builder(config)
        .mount(routes::REGISTER, routes::register(), post(pending))
        .mount(routes::LOGIN, routes::login(), post(pending))
        .mount(routes::SYNC, routes::sync(), post(pending))
        .mount(routes::DASHBOARD, routes::dashboard(), get(pending))
        .mount(routes::WORKOUTS, routes::workouts(), get(pending))
        .mount(routes::TRENDS, routes::trends(), get(pending))
        .build()?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! WebSocket ↔ TCP bridge in front of the game server.

use std::net::SocketAddr;

use anyhow::{Context, Error};
use gw_bridge::{
    api,
    config::BridgeConfig,
    logging, metrics,
};
use log::{error, info};
use pico_args::Arguments;

const HELP: &str = "\
Relay gamewire frames between WebSocket clients and the game server

USAGE:
  gw_bridge [OPTIONS]

OPTIONS:
  --bind          IP:PORT   WebSocket listener address  [default: env BRIDGE_BIND or 0.0.0.0:8080]
  --backend-host  HOST      Game server host            [default: env BACKEND_HOST or 127.0.0.1]
  --backend-port  PORT      Game server port            [default: env BACKEND_PORT or 5500]

FLAGS:
  -h, --help                Print help information

ENVIRONMENT:
  BRIDGE_BIND                   WebSocket listener address
  BACKEND_HOST                  Game server host
  BACKEND_PORT                  Game server port
  BACKEND_CONNECT_TIMEOUT_MS    Backend connect timeout (default 5000)
  MAX_BUFFERED_BYTES            Per-relay unframed byte ceiling (default 1048576)
  METRICS_BIND                  Prometheus listener address (disabled if unset)
  RUST_LOG                      Log filter (default info)
";

struct Args {
    bind: Option<SocketAddr>,
    backend_host: Option<String>,
    backend_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        backend_host: pargs.opt_value_from_str("--backend-host")?,
        backend_port: pargs.opt_value_from_str("--backend-port")?,
    };

    logging::init();

    let config = BridgeConfig::from_env(args.bind, args.backend_host, args.backend_port)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Metrics exported at http://{metrics_bind}/metrics");
    }

    let bind = config.bind;
    info!(
        "Relaying to {} (connect timeout {:?}, buffer ceiling {} bytes)",
        config.backend_addr(),
        config.backend_connect_timeout,
        config.max_buffered_bytes
    );

    let app = api::create_router(api::AppState::new(config));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;

    info!("Bridge listening on ws://{bind}. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down bridge...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

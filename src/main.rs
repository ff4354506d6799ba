//! web-guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request ID ─▶ trace span ─▶ CSP nonce ─▶ header policy ─┐
//!                                                                              │
//!                     ┌────────────────────────────────────────────────────────┘
//!                     ▼
//!                 timeout / body limit
//!                     │
//!                     ▼
//!                 route guard: resolve → CSRF → auth → signed → verified → throttle
//!                     │
//!                     ▼
//!                 controller (services, policies, views)
//!                     │
//!     Client Response ◀── header policy applied on the way out
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use web_guard::config::{load_config, validate_config, AppConfig, ConfigError};
use web_guard::http::server::shutdown_on;
use web_guard::lifecycle::{shutdown_signal, StartupError};
use web_guard::observability::{logging, metrics};
use web_guard::{HttpServer, Services, Shutdown};

#[derive(Parser)]
#[command(name = "web-guard")]
#[command(about = "Guarded web application server", long_about = None)]
struct Args {
    /// Configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "WEB_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("web-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        routes = config.routes.len(),
        csrf_exemptions = config.csrf.except.len(),
        locale = %config.app.locale,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr).map_err(StartupError::from)?;
    }

    let services = Services::from_config(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, services)?;

    let shutdown = Shutdown::new();
    shutdown_on(shutdown_signal(), shutdown.clone());
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

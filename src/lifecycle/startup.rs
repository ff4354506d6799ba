//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile configuration into the shared tables
//! - Start background tasks (rate-limit window and idle session pruning)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::routing::router::RouteError;
use crate::routing::GuardTable;
use crate::security::headers::HeaderPolicyError;
use crate::security::RateLimiter;
use crate::services::SessionStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route table: {0}")]
    Routes(#[from] RouteError),

    #[error("header policy: {0}")]
    HeaderPolicy(#[from] HeaderPolicyError),

    #[error("docs directory '{path}': {source}")]
    Docs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How often expired rate-limit windows and idle sessions are dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Longest throttle window in the table, so pruning never drops a live one.
pub fn longest_window(table: &GuardTable) -> Duration {
    table
        .routes()
        .iter()
        .filter_map(|r| r.guards.rate_limit)
        .map(|limit| limit.window())
        .max()
        .unwrap_or(PRUNE_INTERVAL)
}

/// Periodically prune expired windows and idle sessions until shutdown.
pub fn spawn_pruning(
    limiter: RateLimiter,
    max_window: Duration,
    sessions: Arc<dyn SessionStore>,
    shutdown: &Shutdown,
) -> JoinHandle<()> {
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pruned = limiter.prune(max_window);
                    if pruned > 0 {
                        tracing::debug!(pruned, remaining = limiter.len(), "Pruned rate-limit windows");
                    }
                    let expired = sessions.prune_expired();
                    if expired > 0 {
                        tracing::debug!(expired, "Pruned idle sessions");
                    }
                }
                _ = rx.recv() => break,
            }
        }
        tracing::debug!("Pruning stopped");
    })
}

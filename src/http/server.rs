//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile configuration into the shared route, header and CSRF tables
//! - Create the Axum router and wire up middleware
//! - Bind server to listener and shut down gracefully

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::{middleware, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{AppError, Redirects};
use crate::http::middleware::route_guard;
use crate::http::request::{assign_csp_nonce, X_REQUEST_ID};
use crate::http::response::HeaderPolicyLayer;
use crate::lifecycle::startup::{longest_window, spawn_pruning, StartupError};
use crate::lifecycle::Shutdown;
use crate::routing::GuardTable;
use crate::security::{CsrfExemptions, HeaderPolicy, Policies, RateLimiter, UrlSigner};
use crate::services::Services;
use crate::web;

/// Application state injected into middleware and controllers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
    pub table: Arc<GuardTable>,
    pub csrf: Arc<CsrfExemptions>,
    pub headers: Arc<HeaderPolicy>,
    pub signer: Arc<UrlSigner>,
    pub limiter: RateLimiter,
    pub policies: Arc<Policies>,
    pub redirects: Arc<Redirects>,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services) -> Result<Self, StartupError> {
        let table = GuardTable::from_config(config.routes.iter())?;
        let headers = HeaderPolicy::from_config(&config.headers)?;
        let signer = if config.app.key.is_empty() {
            tracing::warn!("app.key is not set; signed links will not survive a restart");
            UrlSigner::random()
        } else {
            UrlSigner::new(&config.app.key)
        };
        let redirects = Redirects {
            login: config.auth.login_path.clone(),
            verification_notice: config.auth.verification_notice_path.clone(),
        };

        Ok(Self {
            csrf: Arc::new(CsrfExemptions::new(&config.csrf.except)),
            signer: Arc::new(signer),
            table: Arc::new(table),
            headers: Arc::new(headers),
            limiter: RateLimiter::new(),
            policies: Arc::new(Policies::standard()),
            redirects: Arc::new(redirects),
            services,
            config: Arc::new(config),
        })
    }

    /// Path of the named route with its placeholders filled.
    pub fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
        self.table
            .get(name)
            .and_then(|route| route.pattern.url(params))
            .ok_or_else(|| AppError::Internal(format!("cannot build URL for route '{}'", name)))
    }

    /// Signed, non-expiring URL for the named route.
    pub fn signed_route(
        &self,
        name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String, AppError> {
        let path = self.route_url(name, params)?;
        Ok(self.signer.sign(&path, query, None))
    }

    /// Signed URL for the named route that expires after `ttl`.
    pub fn temporary_signed_route(
        &self,
        name: &str,
        params: &[(&str, &str)],
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let path = self.route_url(name, params)?;
        Ok(self.signer.temporary(&path, &[], ttl, Utc::now()))
    }
}

/// HTTP server for the application.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: AppConfig, services: Services) -> Result<Self, StartupError> {
        let state = AppState::new(config, services)?;
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID, trace span, ID propagation, CSP nonce,
    /// header policy, timeout, body limit, route guard, controller dispatch.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let headers = state.headers.clone();

        Router::new()
            .fallback(web::dispatch)
            .layer(middleware::from_fn_with_state(state.clone(), route_guard))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(HeaderPolicyLayer::new(headers.clone()))
            .layer(middleware::from_fn_with_state(headers, assign_csp_nonce))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` triggers, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.state.table.routes().len(), "HTTP server starting");

        let pruning = spawn_pruning(
            self.state.limiter.clone(),
            longest_window(&self.state.table),
            self.state.services.sessions.clone(),
            &shutdown,
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        // The pruning task saw the same broadcast.
        if let Err(e) = pruning.await {
            tracing::warn!(error = %e, "Pruning task ended abnormally");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Trigger `shutdown` when `signal` resolves.
pub fn shutdown_on<F>(signal: F, shutdown: Shutdown)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        shutdown.trigger();
    });
}

//! Request-side helpers.
//!
//! # Responsibilities
//! - Carry the resolved route, session and principal to controllers
//! - Determine the client address used for guest throttling
//! - Assign the per-request CSP nonce before the header policy runs
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context is attached once, after every guard has passed

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{ACCEPT, HOST};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::routing::matcher::Params;
use crate::security::{CspNonce, HeaderPolicy};
use crate::services::{Principal, Session};

pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_REQUESTED_WITH: &str = "x-requested-with";

/// Everything the pipeline learned about an admitted request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Name of the matched route.
    pub route: String,
    pub params: Params,
    pub session: Option<Session>,
    pub principal: Option<Principal>,
    /// Throttle key for guests.
    pub client: String,
    pub nonce: Option<CspNonce>,
    pub wants_json: bool,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Nonce as a JSON value for view contexts.
    pub fn nonce_value(&self) -> serde_json::Value {
        match &self.nonce {
            Some(n) => serde_json::Value::String(n.as_str().to_string()),
            None => serde_json::Value::Null,
        }
    }
}

/// Client address: the first `X-Forwarded-For` hop when trusted, else the
/// socket peer, else `"unknown"`.
pub fn client_address(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Host and scheme used to build the absolute request URL.
pub fn origin(req: &Request, trust_forwarded_for: bool) -> (Option<String>, String) {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let forwarded_proto = trust_forwarded_for
        .then(|| req.headers().get(X_FORWARDED_PROTO))
        .flatten()
        .and_then(|v| v.to_str().ok());
    let scheme = forwarded_proto
        .or(req.uri().scheme_str())
        .unwrap_or("http")
        .to_ascii_lowercase();

    (host, scheme)
}

/// Whether the client asked for JSON instead of redirects and HTML.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));
    let ajax = headers
        .get(X_REQUESTED_WITH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    accepts_json || ajax
}

/// Attach a fresh [`CspNonce`] when the header policy uses one.
pub async fn assign_csp_nonce(
    State(policy): State<Arc<HeaderPolicy>>,
    mut req: Request,
    next: Next,
) -> Response {
    if policy.uses_nonce() {
        req.extensions_mut().insert(CspNonce::generate());
    }
    next.run(req).await
}

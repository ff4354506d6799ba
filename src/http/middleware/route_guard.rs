//! Route guard middleware.
//!
//! Resolves the route, checks CSRF, evaluates the route's guards and attaches
//! a [`RequestContext`] before the controller runs. Rejections become
//! responses here; the controller never sees a rejected request.
//!
//! # Order
//! ```text
//! resolve (404 / 405)
//!     → CSRF (state-changing methods, unless exempt)
//!     → auth → signed → verified → throttle
//!     → controller
//! ```

use std::time::Instant;

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::error::AppError;
use crate::http::request::{client_address, origin, wants_json, RequestContext};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::guards::{self, GuardContext, GuardInput, GuardPass};
use crate::routing::Resolution;
use crate::security::csrf;
use crate::security::CspNonce;
use crate::services::Session;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Form field carrying the token in plain HTML form posts.
const FORM_TOKEN_FIELD: &str = "_token";

struct Rejection {
    route: String,
    error: AppError,
}

impl Rejection {
    fn new(route: &str, error: AppError) -> Self {
        Self {
            route: route.to_string(),
            error,
        }
    }
}

pub async fn route_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let json = wants_json(req.headers());

    let (route, response) = match admit(&state, req, json).await {
        Ok((req, route, pass)) => {
            let mut response = next.run(req).await;
            if let Some(status) = pass.rate_limit {
                let headers = response.headers_mut();
                headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(status.limit));
                headers.insert(
                    X_RATELIMIT_REMAINING.clone(),
                    HeaderValue::from(status.remaining),
                );
            }
            (route, response)
        }
        Err(rejection) => {
            let response = rejection.error.into_response_with(&state.redirects, json);
            (rejection.route, response)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &route, started);
    response
}

async fn admit(
    state: &AppState,
    req: Request,
    json: bool,
) -> Result<(Request, String, GuardPass), Rejection> {
    let (route, params, spec) = match state.table.resolve(req.method(), req.uri().path()) {
        Resolution::Matched { route, params } => {
            (route.name.clone(), params, route.guards.clone())
        }
        Resolution::MethodNotAllowed => {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "Method not allowed");
            return Err(Rejection::new("none", AppError::MethodNotAllowed));
        }
        Resolution::NotFound => {
            tracing::debug!(path = %req.uri().path(), "No route matched");
            return Err(Rejection::new("none", AppError::NotFound));
        }
    };

    let trust_forwarded_for = state.config.auth.trust_forwarded_for;
    let client = client_address(&req, trust_forwarded_for);
    let session = state.services.sessions.current(req.headers());
    let principal = state.services.principal(session.as_ref());

    let reject = |error: AppError| {
        let guard = guard_label(&error);
        metrics::record_guard_rejection(guard);
        tracing::warn!(route = %route, guard, client = %client, error = %error, "Request rejected");
        Rejection::new(&route, error)
    };

    let mut req = verify_csrf(state, req, session.as_ref(), trust_forwarded_for)
        .await
        .map_err(reject)?;

    let input = GuardInput {
        route: &route,
        uri: req.uri(),
        principal: principal.as_ref(),
        client: &client,
        now: Utc::now(),
    };
    let ctx = GuardContext {
        signer: &state.signer,
        limiter: &state.limiter,
    };
    let pass = guards::evaluate(&spec, &input, &ctx).map_err(reject)?;

    let nonce = req.extensions().get::<CspNonce>().cloned();
    req.extensions_mut().insert(RequestContext {
        route: route.clone(),
        params,
        session,
        principal,
        client,
        nonce,
        wants_json: json,
    });

    Ok((req, route, pass))
}

/// Pass safe and exempt requests; otherwise the presented token must equal
/// the session's.
async fn verify_csrf(
    state: &AppState,
    req: Request,
    session: Option<&Session>,
    trust_forwarded_for: bool,
) -> Result<Request, AppError> {
    if !csrf::is_state_changing(req.method()) {
        return Ok(req);
    }

    let (host, scheme) = origin(&req, trust_forwarded_for);
    if state.csrf.is_exempt(req.uri(), host.as_deref(), &scheme) {
        return Ok(req);
    }

    let Some(session) = session else {
        return Err(AppError::CsrfTokenMismatch);
    };

    if let Some(token) = csrf::presented_token(req.headers()) {
        return if csrf::tokens_match(&session.csrf_token, token) {
            Ok(req)
        } else {
            Err(AppError::CsrfTokenMismatch)
        };
    }

    if !is_form(&req) {
        return Err(AppError::CsrfTokenMismatch);
    }

    // Buffer the form so the controller still receives the full body.
    let (parts, body) = req.into_parts();
    let bytes = body::to_bytes(body, state.config.security.max_body_size)
        .await
        .map_err(|_| AppError::CsrfTokenMismatch)?;
    let token = url::form_urlencoded::parse(&bytes)
        .find(|(k, _)| k == FORM_TOKEN_FIELD)
        .map(|(_, v)| v.into_owned());
    let req = Request::from_parts(parts, Body::from(bytes));

    match token {
        Some(token) if csrf::tokens_match(&session.csrf_token, &token) => Ok(req),
        _ => Err(AppError::CsrfTokenMismatch),
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Which stage produced a rejection.
fn guard_label(error: &AppError) -> &'static str {
    match error {
        AppError::CsrfTokenMismatch => "csrf",
        AppError::Unauthenticated => "auth",
        AppError::InvalidSignature(_) => "signed",
        AppError::Unverified => "verified",
        AppError::TooManyAttempts { .. } => "throttle",
        _ => "other",
    }
}

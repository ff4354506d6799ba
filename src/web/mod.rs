//! Controllers.
//!
//! # Data Flow
//! ```text
//! route guard (RequestContext attached)
//!     → dispatch (route name → controller action)
//!     → controller (services, policies, views)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - The guard table is the only router; actions are looked up by route name
//! - Controllers return `Result<Response, AppError>` and never re-check guards
//! - Controller and extractor errors are re-rendered with the configured
//!   redirects and the client's JSON preference

use axum::extract::{FromRequest, Request, State};
use axum::handler::Handler;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::services::Principal;

pub mod auth;
pub mod docs;
pub mod lang;
pub mod pages;
pub mod posts;
pub mod users;
pub mod verification;
pub mod webhooks;

/// Every action a route may name.
pub const ACTIONS: &[&str] = &[
    "home",
    "health",
    "login",
    "login.attempt",
    "logout",
    "register",
    "users.store",
    "dashboard",
    "verification.notice",
    "verification.resend",
    "verification.verify",
    "docs.index",
    "docs.show",
    "posts.update",
    "stripe.charge",
];

/// Run the action named by the admitted route.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let Some((action, wants_json)) = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| (ctx.route.clone(), ctx.wants_json))
    else {
        return AppError::NotFound.into_response();
    };
    let redirects = state.redirects.clone();

    let mut response = match action.as_str() {
        "home" => pages::home.call(req, state).await,
        "health" => pages::health.call(req, state).await,
        "dashboard" => pages::dashboard.call(req, state).await,
        "login" => auth::login_form.call(req, state).await,
        "login.attempt" => auth::login_attempt.call(req, state).await,
        "logout" => auth::logout.call(req, state).await,
        "register" => auth::register_form.call(req, state).await,
        "users.store" => users::store.call(req, state).await,
        "verification.notice" => verification::notice.call(req, state).await,
        "verification.resend" => verification::resend.call(req, state).await,
        "verification.verify" => verification::verify.call(req, state).await,
        "docs.index" => docs::index.call(req, state).await,
        "docs.show" => docs::show.call(req, state).await,
        "posts.update" => posts::update.call(req, state).await,
        "stripe.charge" => webhooks::stripe_charge.call(req, state).await,
        other => {
            tracing::error!(action = %other, "Route names no controller action");
            AppError::NotFound.into_response()
        }
    };

    match response.extensions_mut().remove::<AppError>() {
        Some(error) => error.into_response_with(&redirects, wants_json),
        None => response,
    }
}

/// Request body from either a JSON or a urlencoded form payload.
pub struct Input<T>(pub T);

impl<S, T> FromRequest<S> for Input<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Input(value))
                .map_err(|rejection| AppError::invalid("body", rejection.body_text()))
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Input(value))
                .map_err(|rejection| AppError::invalid("body", rejection.body_text()))
        }
    }
}

/// Treat empty and whitespace-only strings as absent.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The principal the auth guard admitted.
pub fn principal(ctx: &RequestContext) -> Result<&Principal, AppError> {
    ctx.principal.as_ref().ok_or(AppError::Unauthenticated)
}

/// Render `template` with the request's nonce added to `context`.
pub fn render(
    state: &AppState,
    ctx: &RequestContext,
    template: &str,
    mut context: Value,
) -> Result<Response, AppError> {
    if let Value::Object(map) = &mut context {
        map.insert("nonce".to_string(), ctx.nonce_value());
        map.insert("app".to_string(), Value::String(state.config.app.name.clone()));
    }
    let html = state
        .services
        .views
        .render(template, &context)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Html(html).into_response())
}

/// Attach a `Set-Cookie` header.
pub fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| AppError::Internal("invalid cookie value".to_string()))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_cover_default_routes() {
        let routes = crate::config::RouteTable::default();
        for route in routes.iter() {
            assert!(ACTIONS.contains(&route.name.as_str()), "{}", route.name);
        }
        assert_eq!(routes.len(), ACTIONS.len());
    }

    #[test]
    fn test_present() {
        assert_eq!(present(Some("  ".into())), None);
        assert_eq!(present(Some("Ada".into())), Some("Ada".into()));
        assert_eq!(present(None), None);
    }
}

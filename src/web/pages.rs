//! Public and dashboard pages.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use crate::error::AppError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::web::{principal, render};

pub async fn home(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    render(&state, &ctx, "welcome", json!({}))
}

/// Liveness probe.
pub async fn health() -> Response {
    Json(json!({ "status": "up" })).into_response()
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let user = principal(&ctx)?;
    if ctx.wants_json {
        return Ok(Json(user).into_response());
    }
    render(&state, &ctx, "dashboard", json!({ "name": user.name }))
}

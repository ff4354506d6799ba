//! Documentation pages.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use crate::error::AppError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::web::render;

pub async fn index(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let sheets = state.services.sheets.all();
    if ctx.wants_json {
        return Ok(Json(sheets).into_response());
    }
    render(&state, &ctx, "docs.index", json!({ "sheets": sheets }))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let slug = ctx.param("slug").ok_or(AppError::NotFound)?;
    let sheet = state.services.sheets.get(slug).ok_or(AppError::NotFound)?;
    if ctx.wants_json {
        return Ok(Json(sheet).into_response());
    }
    render(
        &state,
        &ctx,
        "docs.show",
        json!({ "title": sheet.title, "body": sheet.body }),
    )
}

//! Post updates, gated by the ownership policy.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::web::{lang, present, principal, Input};

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Input(input): Input<UpdatePostRequest>,
) -> Result<Response, AppError> {
    let user = principal(&ctx)?;
    let post = ctx
        .param("id")
        .and_then(|id| id.parse::<u64>().ok())
        .and_then(|id| state.services.posts.find(id))
        .ok_or(AppError::NotFound)?;

    state.policies.authorize(user, "update", &post)?;

    let Some(title) = present(input.title) else {
        let locale = state.config.app.locale.as_str();
        return Err(AppError::invalid(
            "title",
            lang::message(locale, "title", "required", &[]),
        ));
    };

    let post = state
        .services
        .posts
        .update_title(post.id, title.trim())
        .ok_or(AppError::NotFound)?;
    tracing::info!(post_id = post.id, user_id = user.id, "Post updated");
    Ok(Json(post).into_response())
}

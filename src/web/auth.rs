//! Login, logout and the registration form.

use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::error::{redirect_to, AppError};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::services::sessions::{expired_cookie, session_cookie};
use crate::services::Session;
use crate::web::{lang, present, render, with_cookie, Input};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required)]
    pub password: Option<String>,
}

impl LoginRequest {
    fn normalized(self) -> Self {
        Self {
            email: present(self.email),
            password: present(self.password),
        }
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    form(&state, &ctx, "auth.login")
}

pub async fn register_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    form(&state, &ctx, "auth.register")
}

/// Render a form page, starting a guest session when there is none.
fn form(state: &AppState, ctx: &RequestContext, template: &str) -> Result<Response, AppError> {
    let (session, fresh) = match &ctx.session {
        Some(session) => (session.clone(), false),
        None => (state.services.sessions.start(), true),
    };

    let response = render(state, ctx, template, json!({ "csrf_token": session.csrf_token }))?;
    if fresh {
        with_cookie(response, &cookie_for(state, &session))
    } else {
        Ok(response)
    }
}

pub async fn login_attempt(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Input(input): Input<LoginRequest>,
) -> Result<Response, AppError> {
    let locale = state.config.app.locale.as_str();
    let input = input.normalized();
    input
        .validate()
        .map_err(|e| AppError::ValidationFailed(lang::localize(&e, locale)))?;

    let (Some(email), Some(password)) = (input.email, input.password) else {
        return Err(AppError::invalid("email", lang::message(locale, "email", "required", &[])));
    };

    let Some(user) = state.services.users.check_credentials(&email, &password) else {
        tracing::info!(client = %ctx.client, "Failed login attempt");
        return Err(AppError::invalid(
            "email",
            lang::message(locale, "email", "credentials", &[]),
        ));
    };

    let previous = match &ctx.session {
        Some(session) => session.id.clone(),
        None => String::new(),
    };
    let session = state.services.sessions.login(&previous, user.id);
    tracing::info!(user_id = user.id, "User logged in");

    let target = state.signed_route("dashboard", &[], &[])?;
    with_cookie(redirect_to(&target), &cookie_for(&state, &session))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    if let Some(session) = &ctx.session {
        state.services.sessions.logout(&session.id);
    }
    let cookie = expired_cookie(state.services.sessions.cookie_name());
    with_cookie(redirect_to("/"), &cookie)
}

fn cookie_for(state: &AppState, session: &Session) -> String {
    session_cookie(state.services.sessions.cookie_name(), &session.id)
}

//! Request-level error taxonomy and its HTTP rendering.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::header::{HeaderValue, LOCATION, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::security::SignatureError;

/// Field name → localized messages, in field order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("The given data was invalid.")]
    ValidationFailed(FieldErrors),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("Your email address is not verified.")]
    Unverified,

    #[error("Too many attempts.")]
    TooManyAttempts { retry_after: Duration },

    #[error("Not found.")]
    NotFound,

    #[error("Method not allowed.")]
    MethodNotAllowed,

    #[error("CSRF token mismatch.")]
    CsrfTokenMismatch,

    #[error("This action is unauthorized.")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::ValidationFailed(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidSignature(_) => StatusCode::FORBIDDEN,
            AppError::Unverified => StatusCode::FORBIDDEN,
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            // "Page Expired".
            AppError::CsrfTokenMismatch => StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN),
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidSignature(_) => "invalid_signature",
            AppError::Unverified => "unverified",
            AppError::TooManyAttempts { .. } => "too_many_attempts",
            AppError::NotFound => "not_found",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::CsrfTokenMismatch => "csrf_token_mismatch",
            AppError::Forbidden => "forbidden",
            AppError::Internal(_) => "internal",
        }
    }

    /// Render the error, redirecting browsers for the redirecting variants.
    pub fn into_response_with(self, redirects: &Redirects, wants_json: bool) -> Response {
        if !wants_json {
            let target = match &self {
                AppError::Unauthenticated => Some(&redirects.login),
                AppError::Unverified => Some(&redirects.verification_notice),
                _ => None,
            };
            if let Some(target) = target {
                return redirect_to(target);
            }
        }

        let status = self.status();
        let retry_after = match &self {
            AppError::TooManyAttempts { retry_after } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };

        let body = match self {
            AppError::ValidationFailed(errors) => json!({
                "message": "The given data was invalid.",
                "errors": errors,
            }),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                json!({ "message": "Server Error" })
            }
            other => json!({ "message": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Renders with default redirects for a browser. The error is kept in the
/// response extensions so [`crate::web::dispatch`] can re-render it for the
/// request at hand.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.clone().into_response_with(&Redirects::default(), false);
        response.extensions_mut().insert(self);
        response
    }
}

/// Where the redirecting failures send browsers.
#[derive(Debug, Clone)]
pub struct Redirects {
    pub login: String,
    pub verification_notice: String,
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            verification_notice: "/email/verify".to_string(),
        }
    }
}

/// 303 See Other to `location`.
pub fn redirect_to(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(LOCATION, value)]).into_response(),
        Err(_) => AppError::Internal(format!("invalid redirect target {:?}", location))
            .into_response(),
    }
}

/// Whole seconds, rounded up so clients never retry early.
fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_redirects() {
        let redirects = Redirects::default();
        let response = AppError::Unauthenticated.into_response_with(&redirects, false);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");

        let response = AppError::Unverified.into_response_with(&redirects, false);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/email/verify");
    }

    #[test]
    fn test_json_clients_get_status() {
        let redirects = Redirects::default();
        let response = AppError::Unauthenticated.into_response_with(&redirects, true);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(LOCATION).is_none());
    }

    #[test]
    fn test_default_rendering_keeps_the_error() {
        let mut response = AppError::Unverified.into_response();
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/email/verify");

        let error = response.extensions_mut().remove::<AppError>().unwrap();
        let redirects = Redirects {
            login: "/signin".into(),
            verification_notice: "/confirm".into(),
        };
        let response = error.into_response_with(&redirects, false);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/confirm");
    }

    #[test]
    fn test_too_many_attempts_retry_after() {
        let response = AppError::TooManyAttempts {
            retry_after: Duration::from_millis(40_500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "41");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::CsrfTokenMismatch.status().as_u16(), 419);
        assert_eq!(
            AppError::InvalidSignature(SignatureError::Expired).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::invalid("email", "taken").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}

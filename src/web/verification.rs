//! Email verification: notice page, link resend and the signed verify link.

use axum::extract::State;
use axum::http::header::REFERER;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use axum::Extension;
use chrono::{Duration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{redirect_to, AppError};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::security::csrf::tokens_match;
use crate::web::{principal, render};

/// Hex SHA-256 of the address, the `{hash}` segment of verify links.
pub fn email_hash(email: &str) -> String {
    hex::encode(Sha256::digest(email.as_bytes()))
}

pub async fn notice(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    uri: Uri,
) -> Result<Response, AppError> {
    let user = principal(&ctx)?;
    if user.has_verified_email() {
        return Ok(redirect_to(&state.signed_route("dashboard", &[], &[])?));
    }

    let resent = uri
        .query()
        .is_some_and(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(k, v)| k == "resent" && v == "1"));
    let csrf_token = ctx
        .session
        .as_ref()
        .map(|s| s.csrf_token.clone())
        .unwrap_or_default();

    render(
        &state,
        &ctx,
        "auth.verify-email",
        json!({ "csrf_token": csrf_token, "resent": resent }),
    )
}

pub async fn resend(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let principal = principal(&ctx)?;
    if principal.has_verified_email() {
        return Ok(redirect_to(&state.signed_route("dashboard", &[], &[])?));
    }

    let user = state
        .services
        .users
        .find(principal.id)
        .ok_or(AppError::Unauthenticated)?;

    let id = user.id.to_string();
    let hash = email_hash(&user.email);
    let link = state.temporary_signed_route(
        "verification.verify",
        &[("id", id.as_str()), ("hash", hash.as_str())],
        Duration::minutes(state.config.auth.verification_expire_minutes),
    )?;
    state.services.notifier.notify(&user, &link);

    let back = back_target(&headers, &state.config.auth.verification_notice_path);
    Ok(redirect_to(&with_query(&back, "resent=1")))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let principal = principal(&ctx)?;

    let id_matches = ctx
        .param("id")
        .and_then(|id| id.parse::<u64>().ok())
        .is_some_and(|id| id == principal.id);
    let hash_matches = ctx
        .param("hash")
        .is_some_and(|hash| tokens_match(&email_hash(&principal.email), hash));
    if !id_matches || !hash_matches {
        return Err(AppError::Forbidden);
    }

    if !principal.has_verified_email() {
        state
            .services
            .users
            .mark_email_verified(principal.id, Utc::now());
        tracing::info!(user_id = principal.id, "Email verified");
    }

    let target = state.signed_route("dashboard", &[], &[("verified", "1")])?;
    Ok(redirect_to(&target))
}

/// Path and query of the Referer, else `fallback`. Absolute referers are
/// reduced to their path so the redirect stays on this host.
fn back_target(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
        .and_then(|uri| {
            uri.path_and_query()
                .map(|pq| pq.as_str().to_string())
                .filter(|pq| pq.starts_with('/'))
        })
        .unwrap_or_else(|| fallback.to_string())
}

fn with_query(target: &str, pair: &str) -> String {
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{}{}{}", target, separator, pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_email_hash() {
        assert_eq!(
            email_hash("ada@example.com"),
            hex::encode(Sha256::digest(b"ada@example.com"))
        );
        assert_eq!(email_hash("a").len(), 64);
    }

    #[test]
    fn test_back_target() {
        let mut headers = HeaderMap::new();
        assert_eq!(back_target(&headers, "/email/verify"), "/email/verify");

        headers.insert(REFERER, HeaderValue::from_static("https://evil.example/email/verify?x=1"));
        assert_eq!(back_target(&headers, "/email/verify"), "/email/verify?x=1");
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/email/verify", "resent=1"), "/email/verify?resent=1");
        assert_eq!(with_query("/email/verify?x=1", "resent=1"), "/email/verify?x=1&resent=1");
    }
}

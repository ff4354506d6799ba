//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every route compiles and names a known controller action
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that the header policy compiles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, PLACEHOLDER_APP_KEY};
use crate::routing::Route;
use crate::security::HeaderPolicy;
use crate::services::{MAX_PASSWORD_COST, MIN_PASSWORD_COST};
use crate::web;

/// Locales with bundled validation messages.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "es"];

/// A single semantic problem, located by its config key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Empty selects a per-process key. The placeholder is public.
    if config.app.key == PLACEHOLDER_APP_KEY {
        errors.push(ValidationError::new(
            "app.key",
            "is the published placeholder; set a secret or leave it empty",
        ));
    }

    if !SUPPORTED_LOCALES.contains(&config.app.locale.as_str()) {
        errors.push(ValidationError::new(
            "app.locale",
            format!(
                "unsupported locale '{}', expected one of {:?}",
                config.app.locale, SUPPORTED_LOCALES
            ),
        ));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be positive"));
    }

    if config.auth.verification_expire_minutes <= 0 {
        errors.push(ValidationError::new(
            "auth.verification_expire_minutes",
            "must be positive",
        ));
    }

    if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&config.auth.password_cost) {
        errors.push(ValidationError::new(
            "auth.password_cost",
            format!("must be between {} and {}", MIN_PASSWORD_COST, MAX_PASSWORD_COST),
        ));
    }

    if config.auth.session_lifetime_minutes == 0 {
        errors.push(ValidationError::new(
            "auth.session_lifetime_minutes",
            "must be positive",
        ));
    }

    if config.auth.session_cookie.is_empty()
        || !config
            .auth
            .session_cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(ValidationError::new(
            "auth.session_cookie",
            "must be a non-empty token of letters, digits, '_' or '-'",
        ));
    }

    for (field, path) in [
        ("auth.login_path", &config.auth.login_path),
        (
            "auth.verification_notice_path",
            &config.auth.verification_notice_path,
        ),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must be an absolute path"));
        }
    }

    for (i, pattern) in config.csrf.except.iter().enumerate() {
        if pattern.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("csrf.except[{}]", i),
                "must not be empty",
            ));
        }
    }

    if let Err(e) = HeaderPolicy::from_config(&config.headers) {
        errors.push(ValidationError::new("headers", e.to_string()));
    }

    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate route name '{}'", route.name),
            ));
        }
        if !web::ACTIONS.contains(&route.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("no controller action named '{}'", route.name),
            ));
        }
        if let Err(e) = Route::compile(route) {
            errors.push(ValidationError::new(&field, e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn fields(config: &AppConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_bad_values() {
        let mut config = AppConfig::default();
        config.app.key = PLACEHOLDER_APP_KEY.into();
        config.listener.bind_address = "not an address".into();
        config.auth.verification_expire_minutes = 0;
        config.auth.password_cost = 3;
        config.auth.session_lifetime_minutes = 0;
        config.auth.login_path = "login".into();

        assert_eq!(
            fields(&config),
            vec![
                "app.key",
                "listener.bind_address",
                "auth.verification_expire_minutes",
                "auth.password_cost",
                "auth.session_lifetime_minutes",
                "auth.login_path"
            ]
        );
    }

    #[test]
    fn test_signing_key() {
        let mut config = AppConfig::default();
        assert!(config.app.key.is_empty());

        config.app.key = PLACEHOLDER_APP_KEY.into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "app.key");

        config.app.key = "a-long-deployment-secret".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_route_problems() {
        let mut config = AppConfig::default();
        config
            .routes
            .push(RouteConfig::new("home", "GET", "/again", &[]));
        config
            .routes
            .push(RouteConfig::new("reports", "GET", "/reports", &[]));
        config.routes.push(RouteConfig::new(
            "docs.index",
            "GET",
            "/{*rest}/tail",
            &["throttle:0,1"],
        ));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].message.contains("duplicate route name 'home'"));
        assert!(errors[1].message.contains("no controller action named 'reports'"));
        assert!(errors[2].message.contains("duplicate route name 'docs.index'"));
        assert!(errors[3].message.contains("catch-all"));
    }

    #[test]
    fn test_header_policy_overlap() {
        let mut config = AppConfig::default();
        config.headers.remove.push("Server".into());
        assert_eq!(fields(&config), vec!["headers"]);
    }
}

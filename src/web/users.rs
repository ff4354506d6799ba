//! User registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::services::{NewUser, UserStoreError};
use crate::web::{lang, present, Input};

/// Registration payload. Rule codes select the localized messages.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StoreUserRequest {
    #[validate(required, length(max = 255, code = "max"))]
    pub name: Option<String>,

    #[validate(required, email)]
    pub email: Option<String>,

    /// Must also equal `password_confirmation`, checked in
    /// [`StoreUserRequest::into_new_user`].
    #[validate(required, length(min = 8, code = "min"))]
    pub password: Option<String>,

    pub password_confirmation: Option<String>,
}

impl StoreUserRequest {
    /// Empty strings count as missing.
    pub fn normalized(self) -> Self {
        Self {
            name: present(self.name),
            email: present(self.email),
            password: present(self.password),
            password_confirmation: present(self.password_confirmation),
        }
    }

    /// Validate and convert into the store's input.
    pub fn into_new_user(self, locale: &str) -> Result<NewUser, AppError> {
        let request = self.normalized();
        let mut errors = match request.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if request.password.is_some() && request.password != request.password_confirmation {
            errors.add("password", ValidationError::new("confirmed"));
        }
        if !errors.errors().is_empty() {
            return Err(AppError::ValidationFailed(lang::localize(&errors, locale)));
        }

        match (request.name, request.email, request.password) {
            (Some(name), Some(email), Some(password)) => Ok(NewUser {
                name,
                email,
                password,
            }),
            _ => Err(AppError::Internal("validated request lost a field".to_string())),
        }
    }
}

pub async fn store(
    State(state): State<AppState>,
    Input(input): Input<StoreUserRequest>,
) -> Result<Response, AppError> {
    let locale = state.config.app.locale.as_str();
    let new_user = input.into_new_user(locale)?;

    let user = state.services.users.create(new_user).map_err(|e| match e {
        UserStoreError::Constraint(violation) => AppError::invalid(
            &violation.field,
            lang::message(locale, &violation.field, &violation.constraint, &[]),
        ),
        UserStoreError::Hash(e) => AppError::Internal(format!("cannot store password: {}", e)),
    })?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str, confirmation: &str) -> StoreUserRequest {
        StoreUserRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            password_confirmation: Some(confirmation.into()),
        }
    }

    fn errors(result: Result<NewUser, AppError>) -> crate::error::FieldErrors {
        match result {
            Err(AppError::ValidationFailed(errors)) => errors,
            other => panic!("expected validation failure, got {:?}", other.map(|u| u.email)),
        }
    }

    #[test]
    fn test_valid_request() {
        let user = request("Ada", "ada@example.com", "secret123", "secret123")
            .into_new_user("en")
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_empty_strings_are_required_failures() {
        let errors = errors(request("", " ", "", "").into_new_user("en"));
        assert_eq!(errors["name"], vec!["The name field is required."]);
        assert_eq!(errors["email"], vec!["The email field is required."]);
        assert_eq!(errors["password"], vec!["The password field is required."]);
    }

    #[test]
    fn test_confirmation_must_match() {
        let mismatched = errors(request("Ada", "ada@example.com", "secret123", "secret124").into_new_user("en"));
        assert_eq!(
            mismatched["password"],
            vec!["The password field confirmation does not match."]
        );
        assert!(!mismatched.contains_key("name"));

        let missing = StoreUserRequest {
            password_confirmation: None,
            ..request("Ada", "ada@example.com", "secret123", "")
        };
        let unconfirmed = errors(missing.into_new_user("en"));
        assert_eq!(
            unconfirmed["password"],
            vec!["The password field confirmation does not match."]
        );
    }

    #[test]
    fn test_rule_messages_in_spanish() {
        let long_name = "x".repeat(256);
        let errors = errors(request(&long_name, "not-an-email", "short", "other").into_new_user("es"));
        assert_eq!(
            errors["name"],
            vec!["El campo nombre debe tener menos de 255 caracteres"]
        );
        assert_eq!(errors["email"], vec!["El campo correo electrónico no es válido"]);

        let password = &errors["password"];
        assert_eq!(password.len(), 2);
        assert!(password.contains(&"El campo contraseña debe tener al menos 8 caracteres".to_string()));
        assert!(password.contains(&"La confirmación del campo contraseña no coincide".to_string()));
    }

    #[test]
    fn test_password_messages_agree_in_gender() {
        let missing = errors(StoreUserRequest::default().into_new_user("es"));
        assert_eq!(missing["password"], vec!["El campo contraseña es obligatorio"]);

        let mismatched = errors(request("Ada", "ada@example.com", "secret123", "secret124").into_new_user("es"));
        assert_eq!(
            mismatched["password"],
            vec!["La confirmación del campo contraseña no coincide"]
        );
    }
}

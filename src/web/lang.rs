//! Localized validation messages.
//!
//! Messages are keyed by rule code. `:attribute`, `:min` and `:max` are
//! substituted from the field and the rule parameters.

use validator::ValidationErrors;

use crate::error::FieldErrors;

fn template(locale: &str, code: &str) -> Option<&'static str> {
    let message = match (locale, code) {
        ("es", "required") => "El campo :attribute es obligatorio",
        ("es", "email") => "El campo :attribute no es válido",
        ("es", "max") => "El campo :attribute debe tener menos de :max caracteres",
        ("es", "min") => "El campo :attribute debe tener al menos :min caracteres",
        ("es", "confirmed") => "La confirmación del campo :attribute no coincide",
        ("es", "unique") => "El campo :attribute ya está registrado",
        ("es", "credentials") => "Estas credenciales no coinciden con nuestros registros.",

        (_, "required") => "The :attribute field is required.",
        (_, "email") => "The :attribute field must be a valid email address.",
        (_, "max") => "The :attribute field must not be greater than :max characters.",
        (_, "min") => "The :attribute field must be at least :min characters.",
        (_, "confirmed") => "The :attribute field confirmation does not match.",
        (_, "unique") => "The :attribute has already been taken.",
        (_, "credentials") => "These credentials do not match our records.",
        _ => return None,
    };
    Some(message)
}

fn attribute<'a>(locale: &str, field: &'a str) -> &'a str {
    match (locale, field) {
        ("es", "name") => "nombre",
        ("es", "email") => "correo electrónico",
        ("es", "password") => "contraseña",
        ("es", "title") => "título",
        _ => field,
    }
}

/// Render the message for `code` on `field`.
pub fn message(locale: &str, field: &str, code: &str, params: &[(&str, String)]) -> String {
    let attr = attribute(locale, field).replace('_', " ");
    let Some(template) = template(locale, code) else {
        return format!("{}: {}", attr, code);
    };

    let mut text = template.replace(":attribute", &attr);
    for (name, value) in params {
        text = text.replace(&format!(":{}", name), value);
    }
    text
}

/// Convert validator output into per-field localized messages.
pub fn localize(errors: &ValidationErrors, locale: &str) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|e| {
                let params: Vec<(&str, String)> = e
                    .params
                    .iter()
                    .filter(|(k, _)| k.as_ref() != "value")
                    .map(|(k, v)| (k.as_ref(), v.to_string()))
                    .collect();
                message(locale, &field, &e.code, &params)
            })
            .collect();
        fields.insert(field.to_string(), messages);
    }
    fields
}

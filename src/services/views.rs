//! HTML rendering for the browser-facing pages.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("template '{template}' needs '{field}'")]
    MissingField { template: String, field: String },
}

pub trait ViewRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError>;
}

/// Built-in templates. Every interpolated value is HTML-escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl ViewRenderer for HtmlRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError> {
        let field = |name: &str| -> Result<String, RenderError> {
            match context.get(name) {
                Some(Value::String(s)) => Ok(escape(s)),
                Some(Value::Null) | None => Err(RenderError::MissingField {
                    template: template.to_string(),
                    field: name.to_string(),
                }),
                Some(other) => Ok(escape(&other.to_string())),
            }
        };
        let optional = |name: &str| field(name).unwrap_or_default();

        let (title, body) = match template {
            "welcome" => ("Welcome".to_string(), format!("<h1>{}</h1>", optional("app"))),
            "auth.login" => (
                "Log in".to_string(),
                form("/login", &field("csrf_token")?, &["email", "password"]),
            ),
            "auth.register" => (
                "Register".to_string(),
                form(
                    "/register",
                    &field("csrf_token")?,
                    &["name", "email", "password", "password_confirmation"],
                ),
            ),
            "auth.verify-email" => {
                let status = if context.get("resent").and_then(Value::as_bool) == Some(true) {
                    "<p>A new verification link has been sent to your email address.</p>"
                } else {
                    ""
                };
                (
                    "Verify email".to_string(),
                    format!(
                        "{}{}",
                        status,
                        form(
                            "/email/verification-notification",
                            &field("csrf_token")?,
                            &[]
                        )
                    ),
                )
            }
            "dashboard" => (
                "Dashboard".to_string(),
                format!("<p>Signed in as {}</p>", field("name")?),
            ),
            "docs.index" => {
                let items = context
                    .get("sheets")
                    .and_then(Value::as_array)
                    .map(|sheets| {
                        sheets
                            .iter()
                            .filter_map(|s| Some((s.get("slug")?.as_str()?, s.get("title")?.as_str()?)))
                            .map(|(slug, title)| {
                                format!(
                                    "<li><a href=\"/docs/{}\">{}</a></li>",
                                    escape(slug),
                                    escape(title)
                                )
                            })
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                ("Documentation".to_string(), format!("<ul>{}</ul>", items))
            }
            "docs.show" => (
                field("title")?,
                format!("<article><pre>{}</pre></article>", field("body")?),
            ),
            other => return Err(RenderError::UnknownTemplate(other.to_string())),
        };

        Ok(layout(&title, &body, context.get("nonce").and_then(Value::as_str)))
    }
}

fn layout(title: &str, body: &str, nonce: Option<&str>) -> String {
    let script = match nonce {
        Some(nonce) => format!(
            "<script nonce=\"{}\">document.documentElement.classList.add('js');</script>",
            escape(nonce)
        ),
        None => String::new(),
    };
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title>{}</head><body>{}</body></html>",
        title, script, body
    )
}

fn form(action: &str, csrf_token: &str, fields: &[&str]) -> String {
    let inputs: String = fields
        .iter()
        .map(|name| {
            let kind = if name.starts_with("password") { "password" } else { "text" };
            format!("<input type=\"{}\" name=\"{}\">", kind, name)
        })
        .collect();
    format!(
        "<form method=\"POST\" action=\"{}\"><input type=\"hidden\" name=\"_token\" value=\"{}\">{}<button type=\"submit\">Submit</button></form>",
        action, csrf_token, inputs
    )
}

/// Escape text for HTML element and attribute content.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }

    #[test]
    fn test_login_form_carries_token() {
        let html = HtmlRenderer
            .render("auth.login", &json!({ "csrf_token": "tok123" }))
            .unwrap();
        assert!(html.contains("value=\"tok123\""));
        assert!(html.contains("action=\"/login\""));
    }

    #[test]
    fn test_missing_field() {
        let err = HtmlRenderer.render("auth.login", &json!({})).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingField {
                template: "auth.login".into(),
                field: "csrf_token".into()
            }
        );
    }

    #[test]
    fn test_unknown_template() {
        assert!(matches!(
            HtmlRenderer.render("nope", &json!({})),
            Err(RenderError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_nonce_on_inline_script() {
        let html = HtmlRenderer
            .render("welcome", &json!({ "app": "Web Guard", "nonce": "abc" }))
            .unwrap();
        assert!(html.contains("<script nonce=\"abc\">"));
    }

    #[test]
    fn test_docs_show_escapes_body() {
        let html = HtmlRenderer
            .render("docs.show", &json!({ "title": "T", "body": "<script>" }))
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
    }
}

//! Response header policy.
//!
//! # Responsibilities
//! - Remove information-disclosing headers
//! - Blank headers that servers fill in by default (e.g. `Server`)
//! - Set Content-Security-Policy from the configured directive table
//!
//! # Design Decisions
//! - Compiled once from config; applying it is a pure function of the
//!   response headers and the request's nonce
//! - The policy is the final writer of Content-Security-Policy
//! - Application is idempotent

use axum::http::header::{HeaderName, HeaderValue, CONTENT_SECURITY_POLICY};
use axum::http::HeaderMap;
use thiserror::Error;
use uuid::Uuid;

use crate::config::HeaderPolicyConfig;

/// Directives emitted first, in this order, when configured.
pub const DIRECTIVE_ORDER: [&str; 7] = [
    "script-src",
    "script-src-elem",
    "style-src",
    "style-src-elem",
    "img-src",
    "font-src",
    "default-src",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderPolicyError {
    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),
    #[error("header '{0}' is listed in both remove and blank")]
    RemoveAndBlank(String),
    #[error("Content-Security-Policy cannot be removed or blanked")]
    CspListed,
    #[error("invalid CSP directive name '{0}'")]
    InvalidDirective(String),
    #[error("invalid source '{source_expr}' in directive '{directive}'")]
    InvalidSource {
        directive: String,
        source_expr: String,
    },
    #[error("Content-Security-Policy has no directives")]
    EmptyPolicy,
}

/// Per-request nonce for inline scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CspNonce {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The compiled header policy.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    remove: Vec<HeaderName>,
    blank: Vec<HeaderName>,
    directives: Vec<(String, Vec<String>)>,
    script_nonce: bool,
    /// CSP value when no nonce is involved.
    static_csp: HeaderValue,
}

impl HeaderPolicy {
    pub fn from_config(config: &HeaderPolicyConfig) -> Result<Self, HeaderPolicyError> {
        let remove = parse_names(&config.remove)?;
        let blank = parse_names(&config.blank)?;

        if let Some(both) = remove.iter().find(|n| blank.contains(n)) {
            return Err(HeaderPolicyError::RemoveAndBlank(both.to_string()));
        }
        if remove
            .iter()
            .chain(blank.iter())
            .any(|n| n == CONTENT_SECURITY_POLICY)
        {
            return Err(HeaderPolicyError::CspListed);
        }

        let mut directives = Vec::new();
        for name in DIRECTIVE_ORDER {
            if let Some(sources) = config.csp.get(name) {
                directives.push((name.to_string(), sources.clone()));
            }
        }
        // BTreeMap iteration gives the remaining directives in name order.
        for (name, sources) in &config.csp {
            if !DIRECTIVE_ORDER.contains(&name.as_str()) {
                directives.push((name.clone(), sources.clone()));
            }
        }

        for (name, sources) in &directives {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(HeaderPolicyError::InvalidDirective(name.clone()));
            }
            for source in sources {
                let valid = !source.is_empty()
                    && source.chars().all(|c| c.is_ascii_graphic() && c != ';' && c != ',');
                if !valid {
                    return Err(HeaderPolicyError::InvalidSource {
                        directive: name.clone(),
                        source_expr: source.clone(),
                    });
                }
            }
        }
        directives.retain(|(_, sources)| !sources.is_empty());

        // A nonce alone would leave nonce-less responses without a policy.
        if directives.is_empty() {
            return Err(HeaderPolicyError::EmptyPolicy);
        }

        let mut policy = Self {
            remove,
            blank,
            directives,
            script_nonce: config.script_nonce,
            static_csp: HeaderValue::from_static(""),
        };
        policy.static_csp = HeaderValue::from_str(&policy.content_security_policy(None))
            .map_err(|_| HeaderPolicyError::EmptyPolicy)?;
        Ok(policy)
    }

    /// Whether requests need a nonce assigned before this policy runs.
    pub fn uses_nonce(&self) -> bool {
        self.script_nonce
    }

    /// Build the Content-Security-Policy value.
    ///
    /// Each directive renders as `name source source;` with no separator
    /// between directives.
    pub fn content_security_policy(&self, nonce: Option<&CspNonce>) -> String {
        let nonce_source = match nonce {
            Some(n) if self.script_nonce => Some(format!("'nonce-{}'", n.as_str())),
            _ => None,
        };

        let mut csp = String::new();
        let mut nonce_placed = false;
        for (name, sources) in &self.directives {
            csp.push_str(name);
            for source in sources {
                csp.push(' ');
                csp.push_str(source);
            }
            if name == "script-src" {
                if let Some(n) = &nonce_source {
                    csp.push(' ');
                    csp.push_str(n);
                    nonce_placed = true;
                }
            }
            csp.push(';');
        }

        if let (Some(n), false) = (&nonce_source, nonce_placed) {
            csp.insert_str(0, &format!("script-src {};", n));
        }
        csp
    }

    /// Apply the policy to a response's headers in place.
    pub fn apply(&self, headers: &mut HeaderMap, nonce: Option<&CspNonce>) {
        for name in &self.remove {
            headers.remove(name);
        }
        for name in &self.blank {
            headers.insert(name.clone(), HeaderValue::from_static(""));
        }

        let csp = match nonce {
            Some(_) if self.script_nonce => {
                match HeaderValue::from_str(&self.content_security_policy(nonce)) {
                    Ok(value) => value,
                    Err(_) => self.static_csp.clone(),
                }
            }
            _ => self.static_csp.clone(),
        };

        if csp.is_empty() {
            headers.remove(CONTENT_SECURITY_POLICY);
        } else {
            headers.insert(CONTENT_SECURITY_POLICY, csp);
        }
    }
}

fn parse_names(names: &[String]) -> Result<Vec<HeaderName>, HeaderPolicyError> {
    names
        .iter()
        .map(|n| {
            HeaderName::from_bytes(n.trim().as_bytes())
                .map_err(|_| HeaderPolicyError::InvalidHeaderName(n.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    fn config(csp: &[(&str, &[&str])]) -> HeaderPolicyConfig {
        HeaderPolicyConfig {
            remove: vec!["X-Powered-By".into()],
            blank: vec!["Server".into()],
            script_nonce: false,
            csp: csp
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_csp_exact_format() {
        let policy = HeaderPolicy::from_config(&config(&[
            ("style-src", &["'self'", "'unsafe-inline'", "https://fonts.bunny.net"]),
            ("script-src", &["'self'", "https://cdnjs.cloudflare.com/"]),
        ]))
        .unwrap();

        assert_eq!(
            policy.content_security_policy(None),
            "script-src 'self' https://cdnjs.cloudflare.com/;style-src 'self' 'unsafe-inline' https://fonts.bunny.net;"
        );
    }

    #[test]
    fn test_fixed_order_then_extras_and_empty_omitted() {
        let policy = HeaderPolicy::from_config(&config(&[
            ("frame-ancestors", &["'none'"]),
            ("default-src", &["'self'"]),
            ("connect-src", &["'self'"]),
            ("img-src", &["'self'", "https://laravel.com", "https://flowbite.com"]),
            ("font-src", &[]),
        ]))
        .unwrap();

        assert_eq!(
            policy.content_security_policy(None),
            "img-src 'self' https://laravel.com https://flowbite.com;default-src 'self';connect-src 'self';frame-ancestors 'none';"
        );
    }

    #[test]
    fn test_apply_replaces_handler_csp() {
        let policy = HeaderPolicy::from_config(&config(&[("default-src", &["'self'"])])).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src *"));
        headers.insert("x-powered-by", HeaderValue::from_static("PHP/8.3"));
        headers.insert("server", HeaderValue::from_static("nginx/1.25"));
        headers.insert("content-type", HeaderValue::from_static("text/html"));

        policy.apply(&mut headers, None);

        assert_eq!(headers.get(CONTENT_SECURITY_POLICY).unwrap(), "default-src 'self';");
        assert!(headers.get("x-powered-by").is_none());
        assert_eq!(headers.get("server").unwrap(), "");
        assert_eq!(headers.get("content-type").unwrap(), "text/html");
    }

    #[test]
    fn test_nonce_appended_to_script_src() {
        let mut cfg = config(&[("script-src", &["'self'"]), ("default-src", &["'self'"])]);
        cfg.script_nonce = true;
        let policy = HeaderPolicy::from_config(&cfg).unwrap();
        let nonce = CspNonce::from("abc123");

        assert_eq!(
            policy.content_security_policy(Some(&nonce)),
            "script-src 'self' 'nonce-abc123';default-src 'self';"
        );
        assert_eq!(
            policy.content_security_policy(None),
            "script-src 'self';default-src 'self';"
        );
    }

    #[test]
    fn test_nonce_creates_script_src() {
        let mut cfg = config(&[("default-src", &["'self'"])]);
        cfg.script_nonce = true;
        let policy = HeaderPolicy::from_config(&cfg).unwrap();

        assert_eq!(
            policy.content_security_policy(Some(&CspNonce::from("n"))),
            "script-src 'nonce-n';default-src 'self';"
        );
    }

    #[test]
    fn test_config_errors() {
        let mut cfg = config(&[("default-src", &["'self'"])]);
        cfg.blank.push("x-powered-by".into());
        assert_eq!(
            HeaderPolicy::from_config(&cfg).unwrap_err(),
            HeaderPolicyError::RemoveAndBlank("x-powered-by".into())
        );

        let mut cfg = config(&[("default-src", &["'self'"])]);
        cfg.remove.push("Content-Security-Policy".into());
        assert_eq!(
            HeaderPolicy::from_config(&cfg).unwrap_err(),
            HeaderPolicyError::CspListed
        );

        let cfg = config(&[("default-src", &["'self'; script-src *"])]);
        assert!(matches!(
            HeaderPolicy::from_config(&cfg),
            Err(HeaderPolicyError::InvalidSource { .. })
        ));

        let cfg = config(&[("Default-Src", &["'self'"])]);
        assert!(matches!(
            HeaderPolicy::from_config(&cfg),
            Err(HeaderPolicyError::InvalidDirective(_))
        ));

        let cfg = config(&[("default-src", &[])]);
        assert_eq!(
            HeaderPolicy::from_config(&cfg).unwrap_err(),
            HeaderPolicyError::EmptyPolicy
        );

        let mut cfg = config(&[]);
        cfg.script_nonce = true;
        assert_eq!(
            HeaderPolicy::from_config(&cfg).unwrap_err(),
            HeaderPolicyError::EmptyPolicy
        );

        let mut cfg = config(&[("default-src", &["'self'"])]);
        cfg.remove.push("bad header".into());
        assert!(matches!(
            HeaderPolicy::from_config(&cfg),
            Err(HeaderPolicyError::InvalidHeaderName(_))
        ));
    }

    fn header_map() -> impl Strategy<Value = HeaderMap> {
        let names = prop::sample::select(vec![
            "server",
            "x-powered-by",
            "content-type",
            "content-security-policy",
            "cache-control",
            "x-custom",
        ]);
        prop::collection::vec((names, "[a-zA-Z0-9 ;'/:.-]{0,24}"), 0..8).prop_map(|pairs| {
            let mut headers = HeaderMap::new();
            for (name, value) in pairs {
                if let Ok(v) = HeaderValue::from_str(&value) {
                    headers.append(name, v);
                }
            }
            headers
        })
    }

    proptest! {
        #[test]
        fn prop_apply_is_idempotent(headers in header_map(), with_nonce in any::<bool>()) {
            let mut cfg = HeaderPolicyConfig::default();
            cfg.script_nonce = with_nonce;
            let policy = HeaderPolicy::from_config(&cfg).unwrap();
            let nonce = CspNonce::from("fixed");

            let mut once = headers.clone();
            policy.apply(&mut once, Some(&nonce));
            let mut twice = once.clone();
            policy.apply(&mut twice, Some(&nonce));

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_removed_absent_blanked_empty(headers in header_map()) {
            let cfg = HeaderPolicyConfig::default();
            let policy = HeaderPolicy::from_config(&cfg).unwrap();

            let mut out = headers.clone();
            policy.apply(&mut out, None);

            for name in &cfg.remove {
                prop_assert!(out.get(name.as_str()).is_none());
            }
            for name in &cfg.blank {
                let values: Vec<&str> = out
                    .get_all(name.as_str())
                    .iter()
                    .map(|v| v.to_str().unwrap_or("?"))
                    .collect();
                prop_assert_eq!(values, vec![""]);
            }
            prop_assert_eq!(out.get_all(CONTENT_SECURITY_POLICY).iter().count(), 1);
        }

        #[test]
        fn prop_other_headers_pass_through(headers in header_map()) {
            let policy = HeaderPolicy::from_config(&HeaderPolicyConfig::default()).unwrap();
            let mut out = headers.clone();
            policy.apply(&mut out, None);

            for name in ["content-type", "cache-control", "x-custom"] {
                let before: Vec<_> = headers.get_all(name).iter().collect();
                let after: Vec<_> = out.get_all(name).iter().collect();
                prop_assert_eq!(before, after);
            }
        }
    }
}

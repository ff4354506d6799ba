//! CSRF validation for state-changing requests.
//!
//! Token issuance belongs to the session store; this module only decides
//! whether a request must present a token and whether the presented token
//! matches the session's.

use axum::http::{HeaderMap, Method, Uri};

use crate::routing::matcher::glob_matches;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Configured exemption globs.
#[derive(Debug, Clone, Default)]
pub struct CsrfExemptions {
    /// Matched against the path without its leading slash.
    paths: Vec<String>,
    /// Matched against `scheme://host/path`.
    urls: Vec<String>,
}

impl CsrfExemptions {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut exemptions = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.contains("://") {
                exemptions.urls.push(pattern.to_string());
            } else {
                let path = pattern.trim_start_matches('/');
                exemptions.paths.push(if path.is_empty() {
                    "/".to_string()
                } else {
                    path.to_string()
                });
            }
        }
        exemptions
    }

    /// Whether the request URL is exempt. `host` comes from the `Host` header
    /// when the URI is not absolute.
    pub fn is_exempt(&self, uri: &Uri, host: Option<&str>, scheme: &str) -> bool {
        let trimmed = uri.path().trim_start_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };
        if self.paths.iter().any(|p| glob_matches(p, path)) {
            return true;
        }

        if self.urls.is_empty() {
            return false;
        }
        let Some(host) = uri.authority().map(|a| a.as_str()).or(host) else {
            return false;
        };
        let scheme = uri.scheme_str().unwrap_or(scheme);
        let full = format!("{}://{}{}", scheme, host, uri.path());
        self.urls.iter().any(|p| glob_matches(p, &full))
    }
}

/// Methods that need a CSRF token.
pub fn is_state_changing(method: &Method) -> bool {
    !method.is_safe()
}

/// Token presented by the client, from either supported header.
pub fn presented_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CSRF_HEADER)
        .or_else(|| headers.get(XSRF_HEADER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Compare the presented token with the session token without an early exit.
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn exemptions() -> CsrfExemptions {
        CsrfExemptions::new(&[
            "stripe/*",
            "https://*.cloudworkstations.dev/login",
            "https://*.cloudworkstations.dev/register",
        ])
    }

    #[test]
    fn test_path_exemptions() {
        let ex = exemptions();
        let uri: Uri = "/stripe/charge".parse().unwrap();
        assert!(ex.is_exempt(&uri, Some("localhost"), "http"));

        let uri: Uri = "/register".parse().unwrap();
        assert!(!ex.is_exempt(&uri, Some("localhost"), "http"));
    }

    #[test]
    fn test_url_exemptions_use_host() {
        let ex = exemptions();
        let uri: Uri = "/login".parse().unwrap();
        assert!(ex.is_exempt(&uri, Some("8080-abc.cloudworkstations.dev"), "https"));
        assert!(!ex.is_exempt(&uri, Some("8080-abc.cloudworkstations.dev"), "http"));
        assert!(!ex.is_exempt(&uri, Some("example.com"), "https"));
        assert!(!ex.is_exempt(&uri, None, "https"));

        let absolute: Uri = "https://w.cloudworkstations.dev/register".parse().unwrap();
        assert!(ex.is_exempt(&absolute, None, "http"));
    }

    #[test]
    fn test_leading_slash_in_pattern_ignored() {
        let ex = CsrfExemptions::new(&["/webhooks/*"]);
        let uri: Uri = "/webhooks/github".parse().unwrap();
        assert!(ex.is_exempt(&uri, None, "http"));
    }

    #[test]
    fn test_state_changing_methods() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::PUT));
        assert!(is_state_changing(&Method::PATCH));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
    }

    #[test]
    fn test_presented_token_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_token(&headers), None);
        headers.insert(XSRF_HEADER, HeaderValue::from_static("xsrf"));
        assert_eq!(presented_token(&headers), Some("xsrf"));
        headers.insert(CSRF_HEADER, HeaderValue::from_static("csrf"));
        assert_eq!(presented_token(&headers), Some("csrf"));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "ab"));
    }
}

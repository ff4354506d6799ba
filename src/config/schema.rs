//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults that reproduce the stock application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the web application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity and signing key.
    pub app: AppSettings,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Session and redirect settings for the auth guards.
    pub auth: AuthConfig,

    /// CSRF exemption list.
    pub csrf: CsrfConfig,

    /// Response header policy.
    pub headers: HeaderPolicyConfig,

    /// Documentation pages.
    pub docs: DocsConfig,

    /// Route table. Consulted in specificity order, not file order.
    pub routes: RouteTable,
}

/// Application identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSettings {
    /// Display name used in rendered pages.
    pub name: String,

    /// Secret used to sign URLs. When empty, a random key is generated at
    /// startup and signed links stop verifying after a restart.
    pub key: String,

    /// Locale for validation messages ("en" or "es").
    pub locale: String,
}

/// Published placeholder signing key. Validation rejects it.
pub const PLACEHOLDER_APP_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "web-guard".to_string(),
            key: String::new(),
            locale: "en".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Session and redirect settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the session cookie.
    pub session_cookie: String,

    /// Where unauthenticated browsers are sent.
    pub login_path: String,

    /// Where unverified browsers are sent.
    pub verification_notice_path: String,

    /// Lifetime of emailed verification links, in minutes.
    pub verification_expire_minutes: i64,

    /// Sessions idle longer than this are discarded, in minutes.
    pub session_lifetime_minutes: u64,

    /// bcrypt work factor for stored passwords.
    pub password_cost: u32,

    /// Use the first `X-Forwarded-For` entry as the client address.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "web_guard_session".to_string(),
            login_path: "/login".to_string(),
            verification_notice_path: "/email/verify".to_string(),
            verification_expire_minutes: 60,
            session_lifetime_minutes: 120,
            password_cost: bcrypt::DEFAULT_COST,
            trust_forwarded_for: false,
        }
    }
}

/// CSRF exemption list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Path globs (`*` wildcard) exempt from token validation. Patterns
    /// containing `://` are matched against the full request URL.
    pub except: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            except: vec![
                "stripe/*".to_string(),
                "https://*.cloudworkstations.dev/login".to_string(),
                "https://*.cloudworkstations.dev/register".to_string(),
            ],
        }
    }
}

/// Response header policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderPolicyConfig {
    /// Headers deleted from every response.
    pub remove: Vec<String>,

    /// Headers forced to an empty value on every response.
    pub blank: Vec<String>,

    /// Append a per-request `'nonce-…'` source to `script-src`.
    pub script_nonce: bool,

    /// Content-Security-Policy directives, name to ordered source list.
    pub csp: BTreeMap<String, Vec<String>>,
}

impl Default for HeaderPolicyConfig {
    fn default() -> Self {
        let csp = [
            ("default-src", vec!["'self'"]),
            ("script-src", vec!["'self'"]),
            (
                "style-src",
                vec!["'self'", "'unsafe-inline'", "https://fonts.bunny.net"],
            ),
            ("img-src", vec!["'self'"]),
            ("font-src", vec!["'self'", "https://fonts.bunny.net"]),
        ]
        .into_iter()
        .map(|(name, sources)| {
            (
                name.to_string(),
                sources.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        Self {
            remove: vec!["X-Powered-By".to_string()],
            blank: vec!["Server".to_string()],
            script_nonce: false,
            csp,
        }
    }
}

/// Documentation pages.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DocsConfig {
    /// Directory of page files loaded at startup. Pages are empty when unset.
    pub directory: Option<String>,
}

/// Route definition binding a pattern to a controller action and its guards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Route name, also the controller action it dispatches to.
    pub name: String,

    /// HTTP method (e.g., "GET").
    #[serde(default = "default_method")]
    pub method: String,

    /// Path pattern: static segments, `{param}` and a trailing `{*rest}`.
    pub pattern: String,

    /// Guards in middleware notation: "auth", "signed", "verified",
    /// "throttle:<max>,<minutes>".
    #[serde(default)]
    pub guards: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RouteConfig {
    /// Shorthand used for the built-in table and in tests.
    pub fn new(name: &str, method: &str, pattern: &str, guards: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            pattern: pattern.to_string(),
            guards: guards.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// Ordered route list with the stock application's routes as default.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RouteTable(pub Vec<RouteConfig>);

impl Default for RouteTable {
    fn default() -> Self {
        Self(vec![
            RouteConfig::new("home", "GET", "/", &[]),
            RouteConfig::new("health", "GET", "/up", &[]),
            RouteConfig::new("login", "GET", "/login", &[]),
            RouteConfig::new("login.attempt", "POST", "/login", &[]),
            RouteConfig::new("logout", "POST", "/logout", &["auth"]),
            RouteConfig::new("register", "GET", "/register", &[]),
            RouteConfig::new("users.store", "POST", "/register", &[]),
            RouteConfig::new("dashboard", "GET", "/dashboard", &["auth", "signed"]),
            RouteConfig::new("verification.notice", "GET", "/email/verify", &["auth"]),
            RouteConfig::new(
                "verification.resend",
                "POST",
                "/email/verification-notification",
                &["auth", "throttle:6,1"],
            ),
            RouteConfig::new(
                "verification.verify",
                "GET",
                "/email/verify/{id}/{hash}",
                &["auth", "signed"],
            ),
            RouteConfig::new("docs.index", "GET", "/docs", &[]),
            RouteConfig::new("docs.show", "GET", "/docs/{*slug}", &[]),
            RouteConfig::new("posts.update", "PUT", "/posts/{id}", &["auth", "verified"]),
            RouteConfig::new("stripe.charge", "POST", "/stripe/charge", &[]),
        ])
    }
}

impl RouteTable {
    pub fn iter(&self) -> std::slice::Iter<'_, RouteConfig> {
        self.0.iter()
    }

    pub fn push(&mut self, route: RouteConfig) {
        self.0.push(route);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a route by name.
    pub fn get(&self, name: &str) -> Option<&RouteConfig> {
        self.0.iter().find(|r| r.name == name)
    }
}

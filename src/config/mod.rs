//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → compiled into route, header and CSRF tables shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, AppSettings, AuthConfig, CsrfConfig, DocsConfig, HeaderPolicyConfig,
    ListenerConfig, ObservabilityConfig, RouteConfig, RouteTable, SecurityConfig, TimeoutConfig,
    PLACEHOLDER_APP_KEY,
};
pub use validation::{validate_config, ValidationError};

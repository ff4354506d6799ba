//! Web request pipeline: response header policy, CSRF exemption, and a
//! per-route guard table (auth, signed URL, verified email, throttle).

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod services;
pub mod web;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use services::Services;

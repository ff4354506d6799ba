//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, CSP nonce, client address)
//!     → middleware/route_guard.rs (resolve, CSRF, guards)
//!     → web controllers
//!     → response.rs (header policy)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use response::HeaderPolicyLayer;
pub use server::{AppState, HttpServer};

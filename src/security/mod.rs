//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → csrf.rs (state-changing, non-exempt requests need the session token)
//!     → signature.rs (signed-URL guard)
//!     → rate_limit.rs (throttle guard)
//!     → Pass to controller
//!     → policy.rs (resource predicates, called by controllers)
//!
//! Outgoing response:
//!     → headers.rs (remove, blank, Content-Security-Policy)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Policy tables are built once and shared read-only
//! - Only the rate-limit counters are mutable shared state

pub mod csrf;
pub mod headers;
pub mod policy;
pub mod rate_limit;
pub mod signature;

pub use csrf::CsrfExemptions;
pub use headers::{CspNonce, HeaderPolicy};
pub use policy::Policies;
pub use rate_limit::RateLimiter;
pub use signature::{SignatureError, UrlSigner};

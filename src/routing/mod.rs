//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate pattern, capture params)
//!     → Return: matched Route + GuardSpec, MethodNotAllowed or NotFound
//!     → guards.rs (auth → signed → verified → throttle)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse patterns and guard lists
//!     → Sort by specificity
//!     → Freeze as immutable GuardTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod guards;
pub mod matcher;
pub mod router;

pub use guards::{GuardSpec, RateLimit};
pub use router::{GuardTable, Resolution, Route};

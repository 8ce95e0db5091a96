//! Middleware for the portal.
//!
//! # Components
//!
//! - `guard` - Session lookup and access rules for protected pages
//! - `http_metrics` - HTTP request metrics middleware

pub mod guard;
pub mod http_metrics;

pub use guard::{require_access, AccessPolicy, AccessRule, GuardOutcome, GuardState};
pub use http_metrics::http_metrics_middleware;

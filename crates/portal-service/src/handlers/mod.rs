//! HTTP request handlers for the university portal.

pub mod auth;
pub mod dashboards;
pub mod health;
pub mod home;
pub mod metrics;

pub use auth::{callback, login, logout, CallbackParams};
pub use dashboards::{admin_dashboard, debug_claims, student_dashboard};
pub use health::{health_check, readiness_check};
pub use home::home;
pub use metrics::metrics_handler;

//! Observability for the portal.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;

//! Background tasks for the portal.
//!
//! # Tasks
//!
//! - `session_sweeper` - Purges expired sessions when a session TTL is set

pub mod session_sweeper;

pub use session_sweeper::{start_session_sweeper, sweep_interval_for_ttl};

//! Common utilities and types shared across the university portal crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, unverified header parsing, iat checks)
pub mod jwt;

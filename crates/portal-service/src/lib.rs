//! University Portal Service Library
//!
//! An OpenID Connect relying party for a university web portal. Browsers
//! sign in through the realm's identity provider (Authorization-Code flow);
//! the portal verifies the issued tokens against the realm's published keys,
//! keeps the resulting identity in a server-side session and gates pages by
//! realm role.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/guard.rs -> handlers/*.rs -> services/*.rs -> auth/*.rs
//!                                                                       -> session/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS cache, token verification, claims and claim merge
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP response mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Access guard and HTTP metrics
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Authorization redirect, code exchange, login and logout
//! - `session` - Session store and cookie handling
//! - `tasks` - Background session sweeper
//! - `views` - HTML pages

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
pub mod session;
pub mod tasks;
pub mod views;

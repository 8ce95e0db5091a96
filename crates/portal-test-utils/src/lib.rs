//! # Portal Test Utilities
//!
//! Shared test utilities for the university portal.
//!
//! This crate provides:
//! - RSA signing fixtures with matching JWKs (generated once per process)
//! - Claims builder producing RS256-signed tokens (`TestTokenBuilder`)
//! - A wiremock identity provider (`MockIdp`) serving JWKS and token endpoints
//! - Server test harness (`TestPortalServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portal_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let idp = MockIdp::start().await;
//!     idp.mount_jwks(&[primary_signing_key()]).await;
//!
//!     let access_token = TestTokenBuilder::new(&idp.issuer())
//!         .for_user("andrei")
//!         .with_roles(&["student"])
//!         .sign(primary_signing_key());
//!     idp.mount_token_response(&access_token, None).await;
//!
//!     let server = TestPortalServer::spawn(&idp).await?;
//!     // drive server.url() with server.client()
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use token_builders::*;

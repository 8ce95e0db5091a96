//! Token handling for the portal.
//!
//! # Components
//!
//! - `jwks` - JWKS client for fetching and caching the realm's signing keys
//! - `jwt` - Token verification using cached JWKS keys
//! - `claims` - Decoded claims with typed accessors
//! - `merge` - Access-token / ID-token profile merge

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod merge;

pub use claims::{DecodedClaims, ADMIN_ROLE};
pub use jwks::JwksClient;
pub use jwt::{TokenVerifier, VerifierSettings};
pub use merge::merge_claims;

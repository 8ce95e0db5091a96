//! Service layer for the portal.
//!
//! # Components
//!
//! - `authorize` - Authorization redirect construction
//! - `idp_client` - Token endpoint client (code exchange)
//! - `login` - Callback flow: exchange, verify, merge
//! - `logout` - Session teardown and IdP end-session redirect

pub mod authorize;
pub mod idp_client;
pub mod login;
pub mod logout;

pub use authorize::AuthorizationRequest;
pub use idp_client::{IdpClient, TokenResponse};
pub use login::complete_login;
pub use logout::LogoutCoordinator;

//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports types from the [`secrecy`] crate. `SecretString` implements
//! `Debug` with redaction, so any struct deriving `Debug` that holds one is
//! safe to pass to `tracing` or `{:?}`.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct StoredTokens {
//!     username: String,
//!     access_token: SecretString,
//! }
//!
//! let tokens = StoredTokens {
//!     username: "andrei".to_string(),
//!     access_token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Safe - the token is redacted
//! println!("{:?}", tokens);
//!
//! // Reading the value is explicit
//! let raw: &str = tokens.access_token.expose_secret();
//! ```
//!
//! # Portal Usage Guidelines
//!
//! Use `SecretString` for:
//! - Access tokens and ID tokens held in sessions
//! - The OIDC client secret of a confidential client
//! - Authorization codes while they are in flight

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOiJSUzI1NiJ9.payload.sig");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGciOiJSUzI1NiJ9"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("client-secret-value");
        assert_eq!(secret.expose_secret(), "client-secret-value");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct SessionTokens {
            username: String,
            id_token: SecretString,
        }

        let tokens = SessionTokens {
            username: "andrei".to_string(),
            id_token: SecretString::from("id-token-value"),
        };

        let debug_str = format!("{tokens:?}");

        assert!(debug_str.contains("andrei"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("id-token-value"));
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ClientCredentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "uniportal", "client_secret": "s3cr3t"}"#;
        let creds: ClientCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");

        let debug = format!("{creds:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}

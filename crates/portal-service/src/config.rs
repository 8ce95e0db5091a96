//! University portal configuration.
//!
//! Configuration is loaded from environment variables. The client secret is
//! redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default OIDC callback registered with the identity provider.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8081/callback";

/// Default location the IdP sends the browser to after logout.
pub const DEFAULT_POST_LOGOUT_REDIRECT_URI: &str = "http://localhost:8081/";

/// Default scopes requested in the authorization request.
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// Default timeout for token exchange and JWKS fetches.
pub const DEFAULT_IDP_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the IdP timeout; a login should never hang longer.
pub const MAX_IDP_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Default JWKS cache lifetime.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Upper bound for the unknown-`kid` refresh interval.
pub const MAX_JWKS_MIN_REFRESH_SECONDS: u64 = 300;

/// Keycloak endpoints for one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpEndpoints {
    /// Browser-facing authorization endpoint.
    pub authorization: String,

    /// Back-channel token endpoint.
    pub token: String,

    /// Browser-facing end-session endpoint.
    pub logout: String,

    /// Published signing keys.
    pub jwks: String,

    /// Expected `iss` claim of every token.
    pub issuer: String,
}

impl IdpEndpoints {
    /// Derive the realm endpoints from a Keycloak base URL.
    pub fn for_realm(base_url: &str, realm: &str) -> Self {
        let issuer = format!("{}/realms/{}", base_url.trim_end_matches('/'), realm);
        let protocol = format!("{issuer}/protocol/openid-connect");
        Self {
            authorization: format!("{protocol}/auth"),
            token: format!("{protocol}/token"),
            logout: format!("{protocol}/logout"),
            jwks: format!("{protocol}/certs"),
            issuer,
        }
    }
}

/// University portal configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8081").
    pub bind_address: String,

    /// Keycloak realm name.
    pub realm: String,

    /// OIDC client ID registered in the realm.
    pub client_id: String,

    /// Client secret for confidential clients; public clients leave it unset.
    pub client_secret: Option<SecretString>,

    /// Callback URL sent as `redirect_uri`.
    pub redirect_uri: String,

    /// Home location sent as `post_logout_redirect_uri`.
    pub post_logout_redirect_uri: String,

    /// Space-delimited scopes for the authorization request.
    pub scope: String,

    /// Realm endpoints derived from `KEYCLOAK_URL` and `KEYCLOAK_REALM`.
    pub endpoints: IdpEndpoints,

    /// Timeout applied to every back-channel call to the IdP.
    pub idp_http_timeout: Duration,

    /// How long a fetched JWKS is trusted before it is refetched.
    pub jwks_cache_ttl: Duration,

    /// Minimum age of a fresh key set before an unseen `kid` may refetch it.
    /// Zero refetches on every unseen `kid`.
    pub jwks_min_refresh_interval: Duration,

    /// JWT clock skew tolerance in seconds (exp, nbf, iat).
    pub jwt_clock_skew_seconds: i64,

    /// Whether the `aud` claim is checked.
    pub validate_audience: bool,

    /// Expected `aud` value when `validate_audience` is on.
    pub expected_audience: String,

    /// Optional session lifetime. `None` keeps sessions until logout.
    pub session_ttl: Option<Duration>,

    /// Whether the session cookie carries the `Secure` attribute.
    pub session_cookie_secure: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri)
            .field("scope", &self.scope)
            .field("endpoints", &self.endpoints)
            .field("idp_http_timeout", &self.idp_http_timeout)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("validate_audience", &self.validate_audience)
            .field("expected_audience", &self.expected_audience)
            .field("session_ttl", &self.session_ttl)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid IdP HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid JWKS refresh interval configuration: {0}")]
    InvalidJwksRefreshInterval(String),

    #[error("Invalid session TTL configuration: {0}")]
    InvalidSessionTtl(String),

    #[error("Invalid boolean flag: {0}")]
    InvalidFlag(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let idp_base_url = required(vars, "KEYCLOAK_URL")?;
        let realm = required(vars, "KEYCLOAK_REALM")?;
        let client_id = required(vars, "KEYCLOAK_CLIENT_ID")?;

        let client_secret = vars
            .get("KEYCLOAK_CLIENT_SECRET")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let redirect_uri = vars
            .get("REDIRECT_URI")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        let post_logout_redirect_uri = vars
            .get("POST_LOGOUT_REDIRECT_URI")
            .cloned()
            .unwrap_or_else(|| DEFAULT_POST_LOGOUT_REDIRECT_URI.to_string());

        let scope = vars
            .get("OIDC_SCOPE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        let endpoints = IdpEndpoints::for_realm(&idp_base_url, &realm);

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let timeout_secs = match vars.get("IDP_HTTP_TIMEOUT_SECONDS") {
            Some(value_str) => {
                let value = parse_positive_secs("IDP_HTTP_TIMEOUT_SECONDS", value_str)
                    .map_err(ConfigError::InvalidHttpTimeout)?;
                if value > MAX_IDP_HTTP_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidHttpTimeout(format!(
                        "IDP_HTTP_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_IDP_HTTP_TIMEOUT_SECONDS, value
                    )));
                }
                value
            }
            None => DEFAULT_IDP_HTTP_TIMEOUT_SECONDS,
        };

        let jwks_cache_ttl_secs = match vars.get("JWKS_CACHE_TTL_SECONDS") {
            Some(value_str) => parse_positive_secs("JWKS_CACHE_TTL_SECONDS", value_str)
                .map_err(ConfigError::InvalidJwksCacheTtl)?,
            None => DEFAULT_JWKS_CACHE_TTL_SECONDS,
        };

        let jwks_min_refresh_secs = match vars.get("JWKS_MIN_REFRESH_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwksRefreshInterval(format!(
                        "JWKS_MIN_REFRESH_SECONDS must be a non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value > MAX_JWKS_MIN_REFRESH_SECONDS {
                    return Err(ConfigError::InvalidJwksRefreshInterval(format!(
                        "JWKS_MIN_REFRESH_SECONDS must not exceed {} seconds, got {}",
                        MAX_JWKS_MIN_REFRESH_SECONDS, value
                    )));
                }
                value
            }
            None => 0,
        };

        let session_ttl = vars
            .get("SESSION_TTL_SECONDS")
            .map(|value_str| {
                parse_positive_secs("SESSION_TTL_SECONDS", value_str)
                    .map(Duration::from_secs)
                    .map_err(ConfigError::InvalidSessionTtl)
            })
            .transpose()?;

        let validate_audience = parse_flag(vars, "VALIDATE_AUDIENCE", true)?;
        let session_cookie_secure = parse_flag(vars, "SESSION_COOKIE_SECURE", true)?;

        let expected_audience = vars
            .get("EXPECTED_AUDIENCE")
            .cloned()
            .unwrap_or_else(|| client_id.clone());

        Ok(Config {
            bind_address,
            realm,
            client_id,
            client_secret,
            redirect_uri,
            post_logout_redirect_uri,
            scope,
            endpoints,
            idp_http_timeout: Duration::from_secs(timeout_secs),
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwks_min_refresh_interval: Duration::from_secs(jwks_min_refresh_secs),
            jwt_clock_skew_seconds,
            validate_audience,
            expected_audience,
            session_ttl,
            session_cookie_secure,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_positive_secs(name: &str, value_str: &str) -> Result<u64, String> {
    let value: u64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value == 0 {
        return Err(format!("{} must be greater than 0", name));
    }

    Ok(value)
}

fn parse_flag(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(ConfigError::InvalidFlag(format!(
            "{} must be true or false, got '{}'",
            name, v
        ))),
    }
}

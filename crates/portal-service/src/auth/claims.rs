//! Decoded token claims.
//!
//! Keycloak tokens carry a open-ended set of claims, so claims are kept as a
//! JSON object rather than a fixed struct. Typed accessors cover the fields
//! the portal reads. The `sub` value is redacted in Debug output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Role that satisfies every role requirement.
pub const ADMIN_ROLE: &str = "admin";

/// Shown in place of a missing `preferred_username`.
pub const ANONYMOUS_DISPLAY_NAME: &str = "User";

/// Claims of a verified JWT (or the merge of several).
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodedClaims(Map<String, Value>);

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for DecodedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss())
            .field("exp", &self.exp())
            .field("preferred_username", &self.preferred_username())
            .field("roles", &self.roles())
            .finish()
    }
}

impl From<Map<String, Value>> for DecodedClaims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl DecodedClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn sub(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn iss(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    pub fn exp(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    pub fn iat(&self) -> Option<i64> {
        self.0.get("iat").and_then(Value::as_i64)
    }

    pub fn preferred_username(&self) -> Option<&str> {
        self.str_claim("preferred_username")
    }

    /// Name shown in views: `preferred_username`, or [`ANONYMOUS_DISPLAY_NAME`].
    ///
    /// Never `sub`; the subject stays out of rendered pages.
    pub fn display_name(&self) -> &str {
        self.preferred_username().unwrap_or(ANONYMOUS_DISPLAY_NAME)
    }

    /// Realm roles from `realm_access.roles`.
    ///
    /// Non-string entries are skipped. Missing or malformed `realm_access`
    /// yields an empty list.
    pub fn roles(&self) -> Vec<String> {
        self.0
            .get("realm_access")
            .and_then(|ra| ra.get("roles"))
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rewrite `realm_access.roles` so it is always a list of strings.
    ///
    /// Other members of `realm_access` are preserved.
    pub fn with_normalized_roles(mut self) -> Self {
        let roles: Vec<Value> = self.roles().into_iter().map(Value::String).collect();
        let mut realm_access = match self.0.remove("realm_access") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        realm_access.insert("roles".to_string(), Value::Array(roles));
        self.0
            .insert("realm_access".to_string(), Value::Object(realm_access));
        self
    }

    /// Pretty-printed JSON for the claims inspection page.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

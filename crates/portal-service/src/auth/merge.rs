//! Profile merge of access-token and ID-token claims.
//!
//! The access token is the source of roles and wins every conflict. The ID
//! token only fills in profile fields the access token lacks.

use crate::auth::claims::DecodedClaims;
use serde_json::Value;

/// Profile claims copied from the ID token when the access token lacks them.
pub const PROFILE_FIELDS: [&str; 5] = [
    "name",
    "given_name",
    "family_name",
    "preferred_username",
    "email",
];

/// Merge `id_claims` into a copy of `access_claims`.
///
/// Pure and idempotent: `merge_claims(&merge_claims(a, b), b) == merge_claims(a, b)`.
pub fn merge_claims(access_claims: &DecodedClaims, id_claims: &DecodedClaims) -> DecodedClaims {
    let mut merged = access_claims.clone();
    for field in PROFILE_FIELDS {
        if merged.get(field).is_some() {
            continue;
        }
        if let Some(value) = id_claims.get(field).filter(|v| has_content(v)) {
            merged.insert(field, value.clone());
        }
    }
    merged
}

// null and "" in the ID token carry no profile information
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

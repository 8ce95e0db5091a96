//! Authorization redirect construction.
//!
//! Builds the URL that starts the Authorization-Code flow at the IdP.
//! Query values are form-urlencoded by `url`, so a redirect URI containing
//! `&` or `?` cannot smuggle extra parameters.

use crate::errors::PortalError;
use url::Url;

/// Parameters of an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub authorization_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
}

impl AuthorizationRequest<'_> {
    /// Authorization URL with `client_id`, `response_type=code`, `scope`
    /// and `redirect_uri` appended to any query the endpoint already has.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Internal` if the configured endpoint is not a
    /// valid absolute URL.
    pub fn to_url(&self) -> Result<String, PortalError> {
        let mut url = Url::parse(self.authorization_endpoint).map_err(|e| {
            tracing::error!(target: "portal.services.authorize", error = %e, "Invalid authorization endpoint");
            PortalError::Internal(format!("invalid authorization endpoint: {e}"))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", self.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", self.scope)
            .append_pair("redirect_uri", self.redirect_uri);

        Ok(url.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const AUTH_ENDPOINT: &str =
        "http://localhost:8080/realms/university/protocol/openid-connect/auth";

    fn request<'a>(redirect_uri: &'a str, scope: &'a str) -> AuthorizationRequest<'a> {
        AuthorizationRequest {
            authorization_endpoint: AUTH_ENDPOINT,
            client_id: "uniportal",
            redirect_uri,
            scope,
        }
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = request("http://localhost:8081/callback", "openid profile email")
            .to_url()
            .unwrap();

        assert!(url.starts_with(AUTH_ENDPOINT));
        let q = query(&url);
        assert_eq!(q.get("client_id").unwrap(), "uniportal");
        assert_eq!(q.get("response_type").unwrap(), "code");
        assert_eq!(q.get("scope").unwrap(), "openid profile email");
        assert_eq!(q.get("redirect_uri").unwrap(), "http://localhost:8081/callback");
    }

    #[test]
    fn test_redirect_uri_is_encoded() {
        let url = request("http://localhost:8081/callback?next=/admin&x=1", "openid")
            .to_url()
            .unwrap();

        assert!(!url.contains("next=/admin&x=1"));
        let q = query(&url);
        assert_eq!(q.len(), 4);
        assert_eq!(
            q.get("redirect_uri").unwrap(),
            "http://localhost:8081/callback?next=/admin&x=1"
        );
    }

    #[test]
    fn test_existing_query_is_preserved() {
        let req = AuthorizationRequest {
            authorization_endpoint: "https://idp.example/auth?kc_idp_hint=google",
            ..request("http://localhost:8081/callback", "openid")
        };
        let q = query(&req.to_url().unwrap());
        assert_eq!(q.get("kc_idp_hint").unwrap(), "google");
        assert_eq!(q.get("client_id").unwrap(), "uniportal");
    }

    #[test]
    fn test_invalid_endpoint() {
        let req = AuthorizationRequest {
            authorization_endpoint: "not a url",
            ..request("http://localhost:8081/callback", "openid")
        };
        assert!(matches!(req.to_url(), Err(PortalError::Internal(_))));
    }
}

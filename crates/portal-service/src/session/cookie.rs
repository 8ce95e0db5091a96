//! Session cookie handling.
//!
//! The cookie carries only the opaque session ID. It is always `HttpOnly`,
//! `SameSite=Lax` (the IdP redirect back to `/callback` is a top-level
//! cross-site navigation) and scoped to `/`.

use crate::session::SessionId;
use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{time, Cookie, CookieBuilder, SameSite};
use std::time::Duration;

/// Cookie name for the session ID.
pub const SESSION_COOKIE_NAME: &str = "portal_session";

/// Attributes for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Whether to set the Secure flag (should be true behind HTTPS).
    pub secure: bool,

    /// `Max-Age`; `None` makes it a browser-session cookie.
    pub max_age: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            max_age: None,
        }
    }
}

fn base_cookie(value: String, config: &CookieConfig) -> CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
}

/// `Set-Cookie` value that stores `id` in the browser.
pub fn session_cookie(id: &SessionId, config: &CookieConfig) -> Option<HeaderValue> {
    let mut builder = base_cookie(id.as_str().to_string(), config);
    if let Some(max_age) = config.max_age {
        let seconds = i64::try_from(max_age.as_secs()).ok()?;
        builder = builder.max_age(time::Duration::seconds(seconds));
    }
    HeaderValue::from_str(&builder.build().to_string()).ok()
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie(config: &CookieConfig) -> HeaderValue {
    let mut cookie = base_cookie(String::new(), config).build();
    cookie.make_removal();
    HeaderValue::from_str(&cookie.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("portal_session=; Path=/; Max-Age=0"))
}

/// Extract a well-formed session ID from the request's `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .find_map(|cookie| SessionId::parse(cookie.value()))
}

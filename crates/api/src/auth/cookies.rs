//! Session cookies
//!
//! Both tokens travel as `HttpOnly` cookies alongside the JSON body. The
//! browser never sees them from script, and `Max-Age` tracks the token TTL.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::http::header::InvalidHeaderValue;
use time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes shared by every session cookie
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    /// Add the `Secure` attribute (HTTPS deployments)
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `Set-Cookie` value carrying a token
    pub fn set(
        &self,
        name: &str,
        value: &str,
        max_age: Duration,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::try_from(self.render(name, value, max_age.whole_seconds().max(0)))
    }

    /// `Set-Cookie` value that makes the browser drop the cookie
    pub fn clear(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::try_from(self.render(name, "", 0))
    }

    fn render(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!("{name}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Read a cookie from the request's `Cookie` headers. Empty values count as absent.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

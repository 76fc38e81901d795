//! Encrypted cookie session carrying the handshake state between `/lists/create`
//! and `/lists/callback`.
use crate::error::AppError;
use anyhow::Context;
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Screen name whose timeline is being mirrored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Secret half of the pending request token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_token_secret: Option<String>,
}

impl Session {
    /// Undecryptable or malformed cookies read as an empty session.
    pub fn load(jar: &PrivateCookieJar) -> Self {
        jar.get(SESSION_COOKIE)
            .and_then(|c| serde_json::from_str(c.value()).ok())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.request_token_secret.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn store(&self, jar: PrivateCookieJar, secure: bool) -> Result<PrivateCookieJar, AppError> {
        if self.is_empty() {
            return Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")));
        }
        let value = serde_json::to_string(self).context("encoding session")?;
        let cookie = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax);
        Ok(jar.add(cookie))
    }
}

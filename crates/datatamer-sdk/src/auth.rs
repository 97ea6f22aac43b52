//! Credential injection for REST requests and the event stream.
//!
//! The platform accepts two credentials, either or both of which may be set:
//!
//! | Credential | REST request | Event stream URL |
//! |------------|--------------|------------------|
//! | session token | `Cookie: sb-access-token=<token>` | `?token=<token>` |
//! | API key | `Authorization: Bearer <key>` | `?apiKey=<key>` |
//!
//! Browsers cannot attach headers to an event stream, which is why the stream
//! carries its credentials in the query string.

use std::fmt;

use http::{HeaderMap, HeaderValue, header};
use url::Url;

use crate::error::{SdkError, SdkResult};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sb-access-token";

/// Query parameter carrying the session token on the event stream.
pub const STREAM_TOKEN_PARAM: &str = "token";

/// Query parameter carrying the API key on the event stream.
pub const STREAM_API_KEY_PARAM: &str = "apiKey";

/// A snapshot of the configured credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    session_token: Option<String>,
    api_key: Option<String>,
}

impl Credentials {
    /// Create credentials from optional parts.
    pub fn new(session_token: Option<String>, api_key: Option<String>) -> Self {
        Self {
            session_token,
            api_key,
        }
    }

    /// Returns `true` if neither credential is set.
    pub fn is_empty(&self) -> bool {
        self.session_token.is_none() && self.api_key.is_none()
    }

    /// Attach the credentials to REST request headers.
    ///
    /// # Errors
    ///
    /// Returns an auth configuration error if a credential contains bytes
    /// that are not valid in an HTTP header.
    pub fn apply_headers(&self, headers: &mut HeaderMap) -> SdkResult<()> {
        if let Some(token) = &self.session_token {
            let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}"))
                .map_err(|_| SdkError::config("Session token is not a valid header value"))?;
            headers.insert(header::COOKIE, cookie);
        }

        if let Some(key) = &self.api_key {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| SdkError::config("API key is not a valid header value"))?;
            bearer.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, bearer);
        }

        Ok(())
    }

    /// Attach the credentials to an event stream URL as query parameters.
    pub fn apply_query(&self, url: &mut Url) {
        if self.is_empty() {
            // Touching query_pairs_mut() would leave a dangling `?`.
            return;
        }

        let mut pairs = url.query_pairs_mut();
        if let Some(token) = &self.session_token {
            pairs.append_pair(STREAM_TOKEN_PARAM, token);
        }
        if let Some(key) = &self.api_key {
            pairs.append_pair(STREAM_API_KEY_PARAM, key);
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("session_token", &self.session_token.is_some())
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

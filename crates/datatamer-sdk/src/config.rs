//! Client configuration shared by every SDK module.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;
use url::Url;

use crate::{
    auth::Credentials,
    error::{SdkError, SdkResult},
};

/// Request timeout used when [`ClientConfig::timeout`] is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared between modules.
///
/// Credential updates made through one handle are seen by every module on
/// its next request or stream attempt.
pub type SharedConfig = Arc<RwLock<ClientConfig>>;

/// Connection and credential settings for the platform.
///
/// Follows a builder pattern: start from [`ClientConfig::new`] and chain
/// setters.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the platform, e.g. `https://app.datatamer.ai`.
    pub base_url: String,
    /// Session token, sent as the `sb-access-token` cookie.
    pub session_token: Option<String>,
    /// API key, sent as a bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the session token.
    #[must_use]
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wrap the configuration for sharing between modules.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    /// The request timeout, falling back to [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Snapshot of the credentials currently configured.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.session_token.clone(), self.api_key.clone())
    }

    /// Resolve a path such as `/api/notifications/list` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the joined URL does not parse.
    pub fn endpoint(&self, path: &str) -> SdkResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined).map_err(|e| SdkError::config(format!("Invalid URL {joined:?}: {e}")))
    }

    /// Merge a partial update into this configuration.
    pub fn apply(&mut self, update: AuthUpdate) {
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(token) = update.session_token {
            self.session_token = Some(token);
        }
        if let Some(key) = update.api_key {
            self.api_key = Some(key);
        }
        if let Some(timeout) = update.timeout {
            self.timeout = Some(timeout);
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is empty or not an
    /// absolute http(s) URL, or if the timeout is zero.
    pub fn validate(&self) -> SdkResult<()> {
        if self.base_url.is_empty() {
            return Err(SdkError::config("Base URL cannot be empty"));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| SdkError::config(format!("Invalid base URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SdkError::config(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SdkError::config("Timeout cannot be zero"));
        }

        Ok(())
    }
}

// Credentials never reach logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Partial configuration update; `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct AuthUpdate {
    pub base_url: Option<String>,
    pub session_token: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

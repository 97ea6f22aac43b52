//! Error handling for the SDK.

use std::time::Duration;

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// The main result type used throughout the SDK.
pub type SdkResult<T> = Result<T, SdkError>;

/// Error type for every SDK operation.
#[derive(Error, Debug)]
pub enum SdkError {
    /// HTTP client errors (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request was sent but no response came back
    #[error("Network error - no response received: {message}")]
    Network { message: String },

    /// The platform answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        status: StatusCode,
        message: String,
        code: Option<String>,
        details: Option<Value>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A realtime subscription was attempted without an active connection
    #[error("Not connected. Call connect() first.")]
    NotConnected,

    /// Event stream open or read failures
    #[error("Event stream error: {message}")]
    Stream { message: String },
}

impl SdkError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an event stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Translate a non-success response into an [`SdkError::Api`].
    ///
    /// The message is taken from the body's `error` field, then `message`,
    /// and falls back to `HTTP <status> Error`. The whole body is kept as
    /// `details` when it is valid JSON.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let details = serde_json::from_slice::<Value>(body).ok();

        let field = |name: &str| {
            details
                .as_ref()
                .and_then(|d| d.get(name))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };

        let message = field("error")
            .or_else(|| field("message"))
            .unwrap_or_else(|| format!("HTTP {} Error", status.as_u16()));

        Self::Api {
            status,
            message,
            code: field("code"),
            details,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Application error code carried by the error, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Structured error details returned by the platform, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SdkError::config("Invalid URL");
        assert!(matches!(err, SdkError::Config { .. }));

        let err = SdkError::timeout(Duration::from_secs(5));
        assert!(matches!(err, SdkError::Timeout { .. }));

        let err = SdkError::stream("closed");
        assert_eq!(err.to_string(), "Event stream error: closed");
    }

    #[test]
    fn test_from_response_prefers_error_field() {
        let body = json!({"error": "Workspace not found", "message": "ignored", "code": "NOT_FOUND"});
        let err = SdkError::from_response(StatusCode::NOT_FOUND, body.to_string().as_bytes());

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.code(), Some("NOT_FOUND"));
        assert_eq!(err.details(), Some(&body));
        assert_eq!(err.to_string(), "API error (404 Not Found): Workspace not found");
    }

    #[test]
    fn test_from_response_uses_message_then_fallback() {
        let err = SdkError::from_response(StatusCode::BAD_REQUEST, br#"{"message":"bad input"}"#);
        assert!(matches!(&err, SdkError::Api { message, .. } if message == "bad input"));
        assert_eq!(err.code(), None);

        let err = SdkError::from_response(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert!(matches!(&err, SdkError::Api { message, .. } if message == "HTTP 502 Error"));
        assert!(err.details().is_none());
    }

    #[test]
    fn test_numeric_code_is_stringified() {
        let err = SdkError::from_response(StatusCode::CONFLICT, br#"{"error":"dup","code":4090}"#);
        assert_eq!(err.code(), Some("4090"));
    }
}

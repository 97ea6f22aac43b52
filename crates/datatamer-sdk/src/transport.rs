//! Core transport abstractions and types.
//!
//! Every REST facade in the SDK talks to the platform through the
//! [`Transport`] trait, so tests and embedders can swap in their own
//! implementation. [`ApiClient`](crate::http::ApiClient) is the HTTP one.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::SdkResult;

/// HTTP method enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// A request against the platform API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,

    /// Path below the base URL, e.g. `/api/notifications/list`
    pub path: String,

    /// Query parameters
    pub query: Vec<(String, String)>,

    /// JSON body
    pub body: Option<Value>,

    /// Overrides the configured timeout for this request
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    /// Create a new request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Create a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Create a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Create a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Create a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a raw JSON body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `body` cannot be represented as JSON.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> SdkResult<Self> {
        Ok(self.body(serde_json::to_value(body)?))
    }

    /// Set a per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Sends authenticated requests and returns the unwrapped success payload.
///
/// Implementations attach credentials, translate non-success responses into
/// [`SdkError::Api`](crate::error::SdkError::Api) and return `Value::Null`
/// for empty bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the parsed JSON payload.
    async fn send(&self, request: ApiRequest) -> SdkResult<Value>;
}

/// Send a request and decode the payload into `T`.
///
/// # Errors
///
/// Propagates transport errors and returns a serialization error when the
/// payload does not match `T`.
pub async fn fetch<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
) -> SdkResult<T> {
    let value = transport.send(request).await?;
    Ok(serde_json::from_value(value)?)
}

//! HTTP implementation of [`Transport`] using reqwest.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, header};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::{AuthUpdate, ClientConfig, SharedConfig},
    error::{SdkError, SdkResult},
    transport::{ApiRequest, Transport, fetch},
};

const USER_AGENT: &str = concat!("datatamer-sdk/", env!("CARGO_PKG_VERSION"));

/// Authenticated JSON client for the platform REST API.
///
/// Credentials are read from the shared configuration on every request, so
/// [`set_api_key`](ApiClient::set_api_key) and friends apply immediately.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: SharedConfig,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &*self.config.read())
            .finish()
    }
}

impl ApiClient {
    /// Create a client that owns its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> SdkResult<Self> {
        Self::with_shared_config(Arc::new(RwLock::new(config)))
    }

    /// Create a client over a configuration shared with other modules.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_shared_config(config: SharedConfig) -> SdkResult<Self> {
        config.read().validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .build()
            .map_err(|e| SdkError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// The configuration handle shared with other modules.
    pub fn shared_config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// Replace the session token used by subsequent requests.
    pub fn set_session_token(&self, token: impl Into<String>) {
        self.config.write().session_token = Some(token.into());
    }

    /// Replace the API key used by subsequent requests.
    pub fn set_api_key(&self, key: impl Into<String>) {
        self.config.write().api_key = Some(key.into());
    }

    /// Merge a partial configuration update.
    pub fn update_auth(&self, update: AuthUpdate) {
        self.config.write().apply(update);
    }

    /// `GET` a path and decode the payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        fetch(self, ApiRequest::get(path)).await
    }

    /// `POST` a JSON body and decode the payload.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdkResult<T> {
        fetch(self, ApiRequest::post(path).json(body)?).await
    }

    /// `PUT` a JSON body and decode the payload.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdkResult<T> {
        fetch(self, ApiRequest::put(path).json(body)?).await
    }

    /// `PATCH` a JSON body and decode the payload.
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdkResult<T> {
        fetch(self, ApiRequest::patch(path).json(body)?).await
    }

    /// `DELETE` a path and decode the payload.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        fetch(self, ApiRequest::delete(path)).await
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn send(&self, request: ApiRequest) -> SdkResult<Value> {
        let (url, credentials, timeout) = {
            let config = self.config.read();
            (
                config.endpoint(&request.path)?,
                config.credentials(),
                request.timeout.unwrap_or_else(|| config.effective_timeout()),
            )
        };

        let mut headers = HeaderMap::new();
        credentials.apply_headers(&mut headers)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers)
            .timeout(timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "Sending API request");
        let started = Instant::now();

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SdkError::timeout(timeout)
            } else if e.is_connect() || e.is_request() {
                SdkError::network(e.to_string())
            } else {
                SdkError::Http(e)
            }
        })?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "API response received"
        );

        if !status.is_success() {
            let err = SdkError::from_response(status, &body);
            warn!(path = %request.path, error = %err, "API request failed");
            return Err(err);
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            ApiClient::new(ClientConfig::new("")),
            Err(SdkError::Config { .. })
        ));
    }

    #[test]
    fn test_credential_setters_share_config() {
        let client = ApiClient::new(ClientConfig::new("https://example.com")).expect("client");
        let shared = client.shared_config();

        client.set_api_key("k1");
        client.set_session_token("s1");

        let config = shared.read();
        assert_eq!(config.api_key.as_deref(), Some("k1"));
        assert_eq!(config.session_token.as_deref(), Some("s1"));
    }

    #[test]
    fn test_update_auth() {
        let client = ApiClient::new(ClientConfig::new("https://example.com")).expect("client");
        client.update_auth(AuthUpdate {
            base_url: Some("https://other.example.com".into()),
            ..Default::default()
        });
        assert_eq!(client.config().base_url, "https://other.example.com");
    }
}

//! Opening the event-stream byte stream.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use http::{HeaderValue, header};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::{
    config::{ClientConfig, DEFAULT_TIMEOUT},
    error::{SdkError, SdkResult},
};

/// Path of the platform's event stream, relative to the base URL.
pub const STREAM_PATH: &str = "/api/sse";

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Raw body chunks of an open event stream.
pub type ByteStream = BoxStream<'static, SdkResult<Bytes>>;

/// Opens one event-stream connection.
///
/// [`RealtimeClient`](super::RealtimeClient) calls this once per connection
/// attempt. Implementations resolve once the server has accepted the stream
/// and fail if it cannot be opened.
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// Open `url`, resuming after `last_event_id` when given.
    async fn open(&self, url: &Url, last_event_id: Option<&str>) -> SdkResult<ByteStream>;
}

/// Build the authenticated stream URL from the current configuration.
///
/// The base URL loses any trailing slash, [`STREAM_PATH`] is appended and the
/// credentials are added as `token` / `apiKey` query parameters.
///
/// # Errors
///
/// Returns a configuration error if the resulting URL does not parse.
pub fn stream_url(config: &ClientConfig) -> SdkResult<Url> {
    let mut url = config.endpoint(STREAM_PATH)?;
    config.credentials().apply_query(&mut url);
    Ok(url)
}

/// [`StreamConnector`] over HTTP using reqwest.
#[derive(Clone, Debug)]
pub struct HttpStreamConnector {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpStreamConnector {
    /// Create a connector whose open attempts time out after `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(connect_timeout: Duration) -> SdkResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SdkError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }
}

impl Default for HttpStreamConnector {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            connect_timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[async_trait]
impl StreamConnector for HttpStreamConnector {
    async fn open(&self, url: &Url, last_event_id: Option<&str>) -> SdkResult<ByteStream> {
        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME))
            .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(id) = last_event_id
            && let Ok(value) = HeaderValue::from_str(id)
        {
            request = request.header("last-event-id", value);
        }

        let response = timeout(self.connect_timeout, request.send())
            .await
            .map_err(|_| SdkError::timeout(self.connect_timeout))?
            .map_err(|e| SdkError::stream(format!("Failed to open event stream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(SdkError::from_response(status, &body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or_default();
        if !content_type.contains(EVENT_STREAM_MIME) {
            return Err(SdkError::stream(format!(
                "Unexpected content type {content_type:?}"
            )));
        }

        debug!(status = status.as_u16(), "Event stream accepted");
        Ok(response
            .bytes_stream()
            .map_err(|e| SdkError::stream(format!("Event stream read failed: {e}")))
            .boxed())
    }
}

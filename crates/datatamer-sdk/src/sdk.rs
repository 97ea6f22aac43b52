//! Top-level SDK entry point.

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::{AuthUpdate, ClientConfig, SharedConfig},
    error::SdkResult,
    http::ApiClient,
    notifications::Notifications,
    realtime::{RealtimeClient, StreamConnector},
};

/// Client for the Data Tamer platform.
///
/// Every module shares one configuration, so a credential change made here
/// applies to the next REST request and the next stream attempt alike.
///
/// # Example
///
/// ```rust,no_run
/// use datatamer_sdk::{ClientConfig, DataTamer};
///
/// # async fn run() -> datatamer_sdk::SdkResult<()> {
/// let sdk = DataTamer::new(ClientConfig::new("https://app.datatamer.ai").api_key("dt_key"))?;
///
/// for notification in sdk.notifications().list().await? {
///     println!("{}: {}", notification.title, notification.message);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DataTamer {
    config: SharedConfig,
    api: ApiClient,
    notifications: Notifications,
    realtime: RealtimeClient,
}

impl DataTamer {
    /// Create the SDK over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or an HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> SdkResult<Self> {
        let config = config.into_shared();
        let realtime = RealtimeClient::new(Arc::clone(&config))?;
        Self::assemble(config, realtime)
    }

    /// Create the SDK with a custom event stream connector.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or an HTTP client
    /// cannot be built.
    pub fn with_stream_connector(
        config: ClientConfig,
        connector: Arc<dyn StreamConnector>,
    ) -> SdkResult<Self> {
        let config = config.into_shared();
        let realtime = RealtimeClient::with_connector(Arc::clone(&config), connector);
        Self::assemble(config, realtime)
    }

    fn assemble(config: SharedConfig, realtime: RealtimeClient) -> SdkResult<Self> {
        let api = ApiClient::with_shared_config(Arc::clone(&config))?;
        let notifications = Notifications::new(Arc::new(api.clone()));
        Ok(Self {
            config,
            api,
            notifications,
            realtime,
        })
    }

    /// Raw authenticated access to the REST API.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// Use `key` for every subsequent request and stream attempt.
    pub fn set_api_key(&self, key: impl Into<String>) {
        self.config.write().api_key = Some(key.into());
    }

    /// Use `token` for every subsequent request and stream attempt.
    pub fn set_session_token(&self, token: impl Into<String>) {
        self.config.write().session_token = Some(token.into());
    }

    /// Merge a partial configuration update into every module.
    pub fn update_auth(&self, update: AuthUpdate) {
        self.config.write().apply(update);
        debug!("SDK configuration updated");
    }
}

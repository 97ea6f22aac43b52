//! Connection options and lifecycle handlers for the realtime client.

use std::{fmt, sync::Arc, time::Duration};

use super::types::RealtimeMessage;
use crate::error::{SdkError, SdkResult};

/// Options accepted by [`RealtimeClient::connect`](super::RealtimeClient::connect).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeOptions {
    /// Re-establish the stream after it is lost.
    pub reconnect: bool,
    /// Delay before each reconnection attempt.
    pub reconnect_interval: Duration,
    /// Attempts allowed after a loss before giving up (0 = never retry).
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

impl RealtimeOptions {
    /// Options with the defaults: reconnect every 3 s, at most 5 times.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the reconnection delay.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the maximum number of reconnection attempts.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if reconnection is enabled with a zero
    /// interval.
    pub fn validate(&self) -> SdkResult<()> {
        if self.reconnect && self.reconnect_interval.is_zero() {
            return Err(SdkError::config("Reconnect interval must be > 0"));
        }
        Ok(())
    }
}

/// Callback receiving every delivered message.
pub type MessageHandler = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;

/// Callback without arguments (open, close, reconnect failed).
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving a connection error.
pub type ErrorHandler = Arc<dyn Fn(&SdkError) + Send + Sync>;

/// Callback receiving the reconnection attempt number (1-based).
pub type ReconnectHandler = Arc<dyn Fn(u32) + Send + Sync>;

/// Caller-supplied lifecycle callbacks. All are optional.
///
/// Handlers run on the runtime task that drives the stream. They must not
/// block; hand long work off to another task.
///
/// # Example
///
/// ```rust
/// use datatamer_sdk::realtime::RealtimeHandlers;
///
/// let handlers = RealtimeHandlers::new()
///     .on_open(|| println!("stream open"))
///     .on_reconnect(|attempt| println!("reconnecting ({attempt})"))
///     .on_error(|err| eprintln!("stream error: {err}"));
/// ```
#[derive(Clone, Default)]
pub struct RealtimeHandlers {
    pub(crate) on_message: Option<MessageHandler>,
    pub(crate) on_open: Option<LifecycleHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) on_close: Option<LifecycleHandler>,
    pub(crate) on_reconnect: Option<ReconnectHandler>,
    pub(crate) on_reconnect_failed: Option<LifecycleHandler>,
}

impl fmt::Debug for RealtimeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_reconnect_failed", &self.on_reconnect_failed.is_some())
            .finish()
    }
}

impl RealtimeHandlers {
    /// Create an empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for unnamed frames and for recognised named frames.
    pub fn on_message(mut self, f: impl Fn(&RealtimeMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called each time the stream opens.
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called when opening fails or an open stream is lost.
    pub fn on_error(mut self, f: impl Fn(&SdkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once by [`disconnect`](super::RealtimeClient::disconnect).
    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Called when a reconnection attempt is scheduled.
    pub fn on_reconnect(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }

    /// Called once when reconnection attempts are exhausted.
    pub fn on_reconnect_failed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect_failed = Some(Arc::new(f));
        self
    }
}

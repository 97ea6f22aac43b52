//! The reconnecting event stream client.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{
    connector::{HttpStreamConnector, StreamConnector, stream_url},
    frame::{DEFAULT_EVENT_TYPE, FrameDecoder, RawFrame},
    options::{MessageHandler, RealtimeHandlers, RealtimeOptions},
    reconnect::{ReconnectDecision, ReconnectState},
    registry::{SharedRegistry, Subscription, SubscriptionRegistry},
    types::{ConnectionState, EventEnvelope, NamedEvent, ReadyState, RealtimeMessage},
};
use crate::{
    config::SharedConfig,
    error::{SdkError, SdkResult},
};

/// Realtime event subscriptions over the platform's event stream.
///
/// The client keeps at most one stream open. When the stream fails or ends it
/// reports the error, waits and opens a new one, up to the configured number
/// of attempts. Credentials are read from the shared configuration on every
/// attempt, so a refreshed token is picked up by the next reconnect.
///
/// Listeners registered with [`subscribe`](RealtimeClient::subscribe) and the
/// observer methods survive reconnects and [`disconnect`](RealtimeClient::disconnect).
///
/// # Example
///
/// ```rust,no_run
/// use datatamer_sdk::{ClientConfig, realtime::{RealtimeClient, RealtimeHandlers, RealtimeOptions}};
///
/// # async fn run() -> datatamer_sdk::SdkResult<()> {
/// let config = ClientConfig::new("https://app.datatamer.ai").api_key("dt_key").into_shared();
/// let realtime = RealtimeClient::new(config)?;
///
/// realtime
///     .connect(
///         RealtimeOptions::default(),
///         RealtimeHandlers::new().on_error(|err| eprintln!("stream error: {err}")),
///     )
///     .await?;
///
/// let subscription = realtime.on_notifications(|data| println!("notification: {data}"))?;
/// // ...
/// subscription.unsubscribe();
/// realtime.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.get_connection_state())
            .finish()
    }
}

struct Inner {
    config: SharedConfig,
    connector: Arc<dyn StreamConnector>,
    state: parking_lot::Mutex<State>,
    registry: SharedRegistry,
}

struct ConnectionSlot {
    generation: u64,
    ready_state: ReadyState,
    task: Option<JoinHandle<()>>,
}

struct State {
    /// Bumped by every `connect` and `disconnect`; timers from an older
    /// session never fire.
    session: u64,
    session_active: bool,
    connection: Option<ConnectionSlot>,
    next_generation: u64,
    connected: bool,
    reconnect: ReconnectState,
    timer: Option<JoinHandle<()>>,
    handlers: RealtimeHandlers,
    last_event_id: Option<String>,
}

impl State {
    fn is_current(&self, generation: u64) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|slot| slot.generation == generation)
    }

    fn close_connection(&mut self) -> bool {
        match self.connection.take() {
            Some(slot) => {
                if let Some(task) = slot.task {
                    task.abort();
                }
                true
            }
            None => false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_timer();
        state.close_connection();
    }
}

impl RealtimeClient {
    /// Create a client that opens the stream over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: SharedConfig) -> SdkResult<Self> {
        let timeout = config.read().effective_timeout();
        let connector = HttpStreamConnector::new(timeout)?;
        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    /// Create a client with a custom [`StreamConnector`].
    pub fn with_connector(config: SharedConfig, connector: Arc<dyn StreamConnector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                state: parking_lot::Mutex::new(State {
                    session: 0,
                    session_active: false,
                    connection: None,
                    next_generation: 0,
                    connected: false,
                    reconnect: ReconnectState::new(&RealtimeOptions::default()),
                    timer: None,
                    handlers: RealtimeHandlers::default(),
                    last_event_id: None,
                }),
                registry: Arc::new(parking_lot::Mutex::new(SubscriptionRegistry::default())),
            }),
        }
    }

    /// Open the event stream.
    ///
    /// Any existing stream and pending reconnect are dropped first, `handlers`
    /// replace the previous ones and the reconnect policy is reset from
    /// `options`. Returns once the first attempt has been started; success
    /// and failure are reported through the handlers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `options` are invalid.
    pub async fn connect(
        &self,
        options: RealtimeOptions,
        handlers: RealtimeHandlers,
    ) -> SdkResult<()> {
        options.validate()?;

        let failed = {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            state.close_connection();
            state.session += 1;
            state.session_active = true;
            state.connected = false;
            state.reconnect = ReconnectState::new(&options);
            state.handlers = handlers;
            state.last_event_id = None;
            self.inner.establish(&mut state)
        };

        if let Some((generation, err)) = failed {
            self.inner.connection_lost(generation, err);
        }
        Ok(())
    }

    /// Close the stream and stop reconnecting.
    ///
    /// Calls `on_close` once if a session was active; calling it again is a
    /// no-op. Registered listeners are kept.
    pub fn disconnect(&self) {
        let on_close = {
            let mut state = self.inner.state.lock();
            state.reconnect.disable();
            state.cancel_timer();
            state.close_connection();
            state.connected = false;
            state.session += 1;
            let was_active = std::mem::replace(&mut state.session_active, false);
            if !was_active {
                return;
            }
            state.handlers.on_close.clone()
        };

        info!("Realtime stream disconnected");
        if let Some(on_close) = on_close {
            on_close();
        }
    }

    /// Listen for frames named `event`.
    ///
    /// The listener receives the parsed JSON payload. Listeners for the same
    /// name run in registration order; registering the same closure twice
    /// yields two independent registrations.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::NotConnected`] before [`connect`](Self::connect)
    /// or after [`disconnect`](Self::disconnect).
    pub fn subscribe(
        &self,
        event: &str,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SdkResult<Subscription> {
        if !self.inner.state.lock().session_active {
            return Err(SdkError::NotConnected);
        }
        let key = self
            .inner
            .registry
            .lock()
            .add_event_listener(event, Arc::new(listener));
        debug!(event, "Realtime listener registered");
        Ok(Subscription::new(&self.inner.registry, key))
    }

    /// Listen for `notification` events.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](Self::subscribe).
    pub fn on_notifications(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SdkResult<Subscription> {
        self.subscribe(NamedEvent::Notification.as_str(), listener)
    }

    /// Listen for `datasource_update` events.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](Self::subscribe).
    pub fn on_datasource_updates(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SdkResult<Subscription> {
        self.subscribe(NamedEvent::DatasourceUpdate.as_str(), listener)
    }

    /// Listen for `topic_update` events.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](Self::subscribe).
    pub fn on_topic_updates(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SdkResult<Subscription> {
        self.subscribe(NamedEvent::TopicUpdate.as_str(), listener)
    }

    /// Listen for `ai_response` events.
    ///
    /// # Errors
    ///
    /// See [`subscribe`](Self::subscribe).
    pub fn on_ai_responses(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SdkResult<Subscription> {
        self.subscribe(NamedEvent::AiResponse.as_str(), listener)
    }

    /// Observe every recognised named event for which `predicate` holds.
    ///
    /// Runs after the `on_message` handler and earlier observers. Stacked
    /// registrations are independent: unsubscribing one leaves the others and
    /// the base handler untouched.
    pub fn on_all_events<P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        P: Fn(&str, &Value) -> bool + Send + Sync + 'static,
        H: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.add_message_observer(move |message| {
            if let Some(envelope) = message.as_event() {
                let event = envelope.event_type();
                if predicate(event, &envelope.data) {
                    handler(event, &envelope.data);
                }
            }
        })
    }

    /// Observe everything the `on_message` handler receives.
    pub fn add_message_observer(
        &self,
        observer: impl Fn(&RealtimeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        let key = self
            .inner
            .registry
            .lock()
            .add_message_observer(Arc::new(observer));
        Subscription::new(&self.inner.registry, key)
    }

    /// Observe every successful open, after the `on_open` handler.
    pub fn add_open_observer(&self, observer: impl Fn() + Send + Sync + 'static) -> Subscription {
        let key = self
            .inner
            .registry
            .lock()
            .add_open_observer(Arc::new(observer));
        Subscription::new(&self.inner.registry, key)
    }

    /// Observe every scheduled reconnect, after the `on_reconnect` handler.
    pub fn add_reconnect_observer(
        &self,
        observer: impl Fn(u32) + Send + Sync + 'static,
    ) -> Subscription {
        let key = self
            .inner
            .registry
            .lock()
            .add_reconnect_observer(Arc::new(observer));
        Subscription::new(&self.inner.registry, key)
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.registry.lock().listener_count(event)
    }

    /// Switch to exponential backoff.
    ///
    /// Delays start at `initial` and grow by 1.5x per attempt up to `max`;
    /// reconnection is re-enabled with `max_attempts` attempts. Applies until
    /// the next [`connect`](Self::connect).
    pub fn enable_auto_reconnect(&self, initial: Duration, max: Duration, max_attempts: u32) {
        self.inner
            .state
            .lock()
            .reconnect
            .enable_exponential(initial, max, max_attempts);
        debug!(
            initial_ms = initial.as_millis() as u64,
            max_ms = max.as_millis() as u64,
            max_attempts,
            "Exponential reconnect enabled"
        );
    }

    /// Snapshot of the connection.
    pub fn get_connection_state(&self) -> ConnectionState {
        let state = self.inner.state.lock();
        ConnectionState {
            connected: state.connected,
            ready_state: state.connection.as_ref().map(|slot| slot.ready_state),
            reconnect_attempts: state.reconnect.attempts(),
        }
    }

    /// Whether the stream is open and delivering events.
    pub fn is_connected_to_stream(&self) -> bool {
        let state = self.get_connection_state();
        state.connected && state.ready_state == Some(ReadyState::Open)
    }

    /// Use `key` for the next connection attempt.
    pub fn set_api_key(&self, key: impl Into<String>) {
        self.inner.config.write().api_key = Some(key.into());
    }

    /// Use `token` for the next connection attempt.
    pub fn set_session_token(&self, token: impl Into<String>) {
        self.inner.config.write().session_token = Some(token.into());
    }
}

impl Inner {
    /// Start a new connection attempt, replacing the current one.
    ///
    /// Returns the generation and error when the attempt fails before a
    /// driver could be spawned; the caller reports it once the lock is
    /// released.
    fn establish(self: &Arc<Self>, state: &mut State) -> Option<(u64, SdkError)> {
        state.close_connection();
        state.next_generation += 1;
        let generation = state.next_generation;

        let mut slot = ConnectionSlot {
            generation,
            ready_state: ReadyState::Connecting,
            task: None,
        };

        let url = match stream_url(&self.config.read()) {
            Ok(url) => url,
            Err(err) => {
                state.connection = Some(slot);
                return Some((generation, err));
            }
        };

        info!(
            generation,
            resuming = state.last_event_id.is_some(),
            "Realtime stream connecting"
        );
        slot.task = Some(tokio::spawn(drive(
            Arc::downgrade(self),
            generation,
            url,
            state.last_event_id.clone(),
        )));
        state.connection = Some(slot);
        None
    }

    fn mark_open(&self, generation: u64) -> bool {
        let on_open = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return false;
            }
            if let Some(slot) = state.connection.as_mut() {
                slot.ready_state = ReadyState::Open;
            }
            state.connected = true;
            state.reconnect.on_open();
            state.handlers.on_open.clone()
        };
        let observers = self.registry.lock().open_observers();

        info!(generation, "Realtime stream connected");
        if let Some(on_open) = on_open {
            on_open();
        }
        for observer in observers {
            observer();
        }
        true
    }

    /// Dispatch decoded frames. Returns `false` once the connection is stale.
    fn deliver(&self, generation: u64, frames: Vec<RawFrame>) -> bool {
        for frame in frames {
            let on_message = {
                let mut state = self.state.lock();
                if !state.is_current(generation) {
                    return false;
                }
                if !frame.id.is_empty() {
                    state.last_event_id = Some(frame.id.clone());
                }
                state.handlers.on_message.clone()
            };
            self.dispatch(&frame, on_message.as_ref());
        }
        true
    }

    fn dispatch(&self, frame: &RawFrame, on_message: Option<&MessageHandler>) {
        let data: Value = match serde_json::from_str(&frame.data) {
            Ok(data) => data,
            Err(err) => {
                warn!(event = %frame.event, error = %err, "Dropping event with malformed payload");
                return;
            }
        };

        let message = if frame.event == DEFAULT_EVENT_TYPE {
            Some(RealtimeMessage::Data(data.clone()))
        } else if NamedEvent::from_name(&frame.event).is_some() {
            Some(RealtimeMessage::Event(EventEnvelope::from_frame(
                frame,
                data.clone(),
            )))
        } else {
            None
        };

        let (observers, listeners) = {
            let registry = self.registry.lock();
            let observers = if message.is_some() {
                registry.message_observers()
            } else {
                Vec::new()
            };
            (observers, registry.event_listeners(&frame.event))
        };

        if message.is_none() && listeners.is_empty() {
            debug!(event = %frame.event, "Ignoring unrecognised event");
            return;
        }

        if let Some(message) = &message {
            if let Some(on_message) = on_message {
                on_message(message);
            }
            for observer in observers {
                observer(message);
            }
        }
        for listener in listeners {
            listener(&data);
        }
    }

    /// Report a failed open or a lost stream and apply the reconnect policy.
    fn connection_lost(self: &Arc<Self>, generation: u64, err: SdkError) {
        let (session, decision, handlers) = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            if let Some(slot) = state.connection.as_mut() {
                slot.ready_state = ReadyState::Closed;
                slot.task = None;
            }
            state.connected = false;
            let decision = state.reconnect.on_connection_lost();
            (state.session, decision, state.handlers.clone())
        };

        error!(generation, error = %err, "Realtime stream error");
        if let Some(on_error) = &handlers.on_error {
            on_error(&err);
        }

        // on_error may have disconnected or reconnected.
        if !self.session_is_active(session) {
            return;
        }

        match decision {
            ReconnectDecision::Retry { attempt, delay } => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Realtime stream reconnecting after delay"
                );
                let observers = self.registry.lock().reconnect_observers();
                if let Some(on_reconnect) = &handlers.on_reconnect {
                    on_reconnect(attempt);
                }
                for observer in observers {
                    observer(attempt);
                }

                self.schedule_reconnect(session, delay);
            }
            ReconnectDecision::Exhausted => {
                error!("Max realtime reconnect attempts exceeded");
                if let Some(on_reconnect_failed) = &handlers.on_reconnect_failed {
                    on_reconnect_failed();
                }
            }
            ReconnectDecision::Stop => {}
        }
    }

    fn session_is_active(&self, session: u64) -> bool {
        let state = self.state.lock();
        state.session == session && state.session_active
    }

    fn schedule_reconnect(self: &Arc<Self>, session: u64, delay: Duration) {
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(session);
            }
        });

        let mut state = self.state.lock();
        if state.session == session {
            state.cancel_timer();
            state.timer = Some(timer);
        } else {
            timer.abort();
        }
    }

    fn fire_reconnect(self: &Arc<Self>, session: u64) {
        let failed = {
            let mut state = self.state.lock();
            if state.session != session || !state.session_active {
                return;
            }
            state.timer = None;
            if !state.reconnect.on_timer_fired() {
                return;
            }
            self.establish(&mut state)
        };

        if let Some((generation, err)) = failed {
            self.connection_lost(generation, err);
        }
    }
}

/// Drives one connection: open, decode, dispatch, report the loss.
///
/// Holds only a weak reference between awaits so dropping the last client
/// handle ends the task.
async fn drive(weak: Weak<Inner>, generation: u64, url: Url, last_event_id: Option<String>) {
    let Some(connector) = weak.upgrade().map(|inner| Arc::clone(&inner.connector)) else {
        return;
    };

    let mut stream = match connector.open(&url, last_event_id.as_deref()).await {
        Ok(stream) => stream,
        Err(err) => {
            if let Some(inner) = weak.upgrade() {
                inner.connection_lost(generation, err);
            }
            return;
        }
    };

    match weak.upgrade() {
        Some(inner) if inner.mark_open(generation) => {}
        _ => return,
    }

    let mut decoder = match last_event_id {
        Some(id) => FrameDecoder::resuming_from(id),
        None => FrameDecoder::new(),
    };

    let reason = loop {
        let (frames, lost) = match stream.next().await {
            Some(Ok(chunk)) => match decoder.push(&chunk) {
                Ok(frames) => (frames, None),
                Err(err) => (Vec::new(), Some(invalid_utf8(err))),
            },
            Some(Err(err)) => (Vec::new(), Some(err)),
            None => match decoder.finish() {
                Ok(frames) => (
                    frames,
                    Some(SdkError::stream("Event stream closed by server")),
                ),
                Err(err) => (Vec::new(), Some(invalid_utf8(err))),
            },
        };

        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !frames.is_empty() && !inner.deliver(generation, frames) {
            return;
        }
        if let Some(lost) = lost {
            break lost;
        }
    };

    if let Some(inner) = weak.upgrade() {
        inner.connection_lost(generation, reason);
    }
}

fn invalid_utf8(err: std::str::Utf8Error) -> SdkError {
    SdkError::stream(format!("Invalid UTF-8 in event stream: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn client() -> RealtimeClient {
        RealtimeClient::new(ClientConfig::new("https://app.example.com").into_shared())
            .expect("client")
    }

    #[test]
    fn test_initial_state() {
        let realtime = client();
        assert_eq!(
            realtime.get_connection_state(),
            ConnectionState {
                connected: false,
                ready_state: None,
                reconnect_attempts: 0,
            }
        );
        assert!(!realtime.is_connected_to_stream());
    }

    #[test]
    fn test_subscribe_requires_connect() {
        let realtime = client();
        assert!(matches!(
            realtime.on_notifications(|_| {}),
            Err(SdkError::NotConnected)
        ));
        assert_eq!(realtime.listener_count("notification"), 0);
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let realtime = client();
        realtime.disconnect();
        realtime.disconnect();
        assert!(!realtime.is_connected_to_stream());
    }

    #[test]
    fn test_observers_do_not_require_connect() {
        let realtime = client();
        let subscription = realtime.add_open_observer(|| {});
        assert!(subscription.event_name().is_none());
        assert!(subscription.unsubscribe());
    }

    #[test]
    fn test_credential_setters_write_shared_config() {
        let config = ClientConfig::new("https://app.example.com").into_shared();
        let realtime = RealtimeClient::new(Arc::clone(&config)).expect("client");
        realtime.set_session_token("s2");
        realtime.set_api_key("k2");
        let config = config.read();
        assert_eq!(config.session_token.as_deref(), Some("s2"));
        assert_eq!(config.api_key.as_deref(), Some("k2"));
    }
}

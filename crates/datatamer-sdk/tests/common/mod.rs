//! Shared helpers for realtime integration tests.

#![allow(dead_code)]

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use datatamer_sdk::{
    ClientConfig, RealtimeHandlers, SdkError, SdkResult, SharedConfig,
    realtime::{ByteStream, StreamConnector},
};
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

/// Result of one scripted `open` call.
pub enum Outcome {
    Fail(String),
    Live(mpsc::UnboundedReceiver<SdkResult<Bytes>>),
}

/// Server side of a scripted open stream.
pub struct LiveStream {
    tx: mpsc::UnboundedSender<SdkResult<Bytes>>,
}

impl LiveStream {
    pub fn send(&self, chunk: &str) {
        let _ = self.tx.send(Ok(Bytes::copy_from_slice(chunk.as_bytes())));
    }

    pub fn send_bytes(&self, chunk: &'static [u8]) {
        let _ = self.tx.send(Ok(Bytes::from_static(chunk)));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(SdkError::stream(message)));
    }

    /// End the stream as if the server closed it.
    pub fn close(self) {}
}

/// A [`StreamConnector`] that replays scripted outcomes.
///
/// Once the script runs out every `open` fails.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<Outcome>>,
    opened: Mutex<Vec<(Url, Option<String>)>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_fail(&self, message: &str) {
        self.script
            .lock()
            .push_back(Outcome::Fail(message.to_string()));
    }

    pub fn push_live(&self) -> LiveStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().push_back(Outcome::Live(rx));
        LiveStream { tx }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.opened.lock().iter().map(|(_, id)| id.clone()).collect()
    }
}

#[async_trait]
impl StreamConnector for MockConnector {
    async fn open(&self, url: &Url, last_event_id: Option<&str>) -> SdkResult<ByteStream> {
        self.opened
            .lock()
            .push((url.clone(), last_event_id.map(str::to_string)));

        match self.script.lock().pop_front() {
            Some(Outcome::Live(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(Outcome::Fail(message)) => Err(SdkError::stream(message)),
            None => Err(SdkError::stream("connection refused")),
        }
    }
}

/// Ordered log of everything the handlers and listeners saw.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Handlers that record `open`, `error`, `close`, `reconnect:<n>`,
    /// `failed` and `message:<payload>`.
    pub fn handlers(&self) -> RealtimeHandlers {
        let (open, error, close, reconnect, failed, message) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        RealtimeHandlers::new()
            .on_open(move || open.push("open"))
            .on_error(move |_| error.push("error"))
            .on_close(move || close.push("close"))
            .on_reconnect(move |attempt| reconnect.push(format!("reconnect:{attempt}")))
            .on_reconnect_failed(move || failed.push("failed"))
            .on_message(move |msg| message.push(format!("message:{}", msg.data())))
    }
}

pub fn shared_config() -> SharedConfig {
    ClientConfig::new("https://app.example.com/")
        .session_token("session-1")
        .into_shared()
}

/// Let spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

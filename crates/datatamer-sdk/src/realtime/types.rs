//! Core type definitions for realtime event handling.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::RawFrame;

/// Named events the platform pushes on the stream.
///
/// Frames with any other name reach only listeners registered for that exact
/// name through [`RealtimeClient::subscribe`](super::RealtimeClient::subscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NamedEvent {
    /// A user notification was created.
    Notification,
    /// A datasource changed state (e.g. finished processing).
    DatasourceUpdate,
    /// A topic was created, renamed or changed.
    TopicUpdate,
    /// An AI conversation produced a response.
    AiResponse,
}

impl NamedEvent {
    /// All recognised events, in wire-name order.
    pub const ALL: [NamedEvent; 4] = [
        Self::Notification,
        Self::DatasourceUpdate,
        Self::TopicUpdate,
        Self::AiResponse,
    ];

    /// The event name as it appears in the `event:` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::DatasourceUpdate => "datasource_update",
            Self::TopicUpdate => "topic_update",
            Self::AiResponse => "ai_response",
        }
    }

    /// Look up a recognised event by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl fmt::Display for NamedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ready state of the underlying stream connection.
///
/// Numeric values match the browser `EventSource` constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReadyState {
    /// The open attempt is in flight.
    Connecting = 0,
    /// The stream is delivering events.
    Open = 1,
    /// The stream has failed or been closed.
    Closed = 2,
}

impl ReadyState {
    /// Raw numeric value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Read-only snapshot of the realtime connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Whether the last open succeeded and no loss has been reported since.
    pub connected: bool,
    /// Ready state of the current connection, `None` when there is none.
    pub ready_state: Option<ReadyState>,
    /// Reconnect attempts made since the last successful open.
    pub reconnect_attempts: u32,
}

/// A decoded named frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Last event id, if the server has sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Event name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Parsed JSON payload.
    pub data: Value,
    /// Server reconnection hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
}

impl EventEnvelope {
    /// Build an envelope from a frame and its already-parsed payload.
    pub(crate) fn from_frame(frame: &RawFrame, data: Value) -> Self {
        Self {
            id: (!frame.id.is_empty()).then(|| frame.id.clone()),
            event: Some(frame.event.clone()),
            data,
            retry: frame.retry.map(|d| d.as_millis() as u64),
        }
    }

    /// The event name, or an empty string for anonymous envelopes.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or_default()
    }
}

/// What the `on_message` handler receives.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeMessage {
    /// Payload of an unnamed (`message`) frame.
    Data(Value),
    /// A recognised named frame.
    Event(EventEnvelope),
}

impl RealtimeMessage {
    /// The JSON payload.
    pub fn data(&self) -> &Value {
        match self {
            Self::Data(data) => data,
            Self::Event(envelope) => &envelope.data,
        }
    }

    /// The event name for named frames.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Event(envelope) => envelope.event.as_deref(),
        }
    }

    /// The envelope for named frames.
    pub fn as_event(&self) -> Option<&EventEnvelope> {
        match self {
            Self::Data(_) => None,
            Self::Event(envelope) => Some(envelope),
        }
    }
}

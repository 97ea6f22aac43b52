//! Realtime events over Server-Sent Events.
//!
//! [`RealtimeClient`] keeps one authenticated event stream open against
//! `<base_url>/api/sse`, decodes its frames and fans each event out to the
//! registered listeners. Lost streams are re-opened according to
//! [`RealtimeOptions`], or with exponential backoff after
//! [`RealtimeClient::enable_auto_reconnect`].
//!
//! # Delivery order
//!
//! For an unnamed frame or one of the [`NamedEvent`]s: the `on_message`
//! handler, then message observers, then listeners for that event name. Frames
//! with any other name reach only listeners subscribed to that exact name.
//! Frames whose data is not valid JSON are logged and dropped.

mod client;
mod connector;
mod frame;
mod options;
mod reconnect;
mod registry;
mod types;

pub use client::RealtimeClient;
pub use connector::{ByteStream, HttpStreamConnector, STREAM_PATH, StreamConnector, stream_url};
pub use frame::{DEFAULT_EVENT_TYPE, FrameDecoder, RawFrame};
pub use options::{
    ErrorHandler, LifecycleHandler, MessageHandler, ReconnectHandler, RealtimeHandlers,
    RealtimeOptions,
};
pub use registry::Subscription;
pub use types::{ConnectionState, EventEnvelope, NamedEvent, ReadyState, RealtimeMessage};

//! # Data Tamer SDK
//!
//! Typed client for the Data Tamer platform: its REST API and its real-time
//! event stream.
//!
//! ## Features
//!
//! - **Authenticated transport**: session cookie and API key bearer auth,
//!   JSON request shaping and structured API errors
//! - **Realtime events**: a Server-Sent Events client that reconnects on its
//!   own, resumes with `Last-Event-ID` and fans events out to listeners
//! - **Notifications**: list, create and acknowledge user notifications
//! - **Shared credentials**: one configuration, updated in place for every
//!   module
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datatamer_sdk::{
//!     ClientConfig, DataTamer,
//!     realtime::{RealtimeHandlers, RealtimeOptions},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sdk = DataTamer::new(
//!         ClientConfig::new("https://app.datatamer.ai").session_token("session-jwt"),
//!     )?;
//!
//!     let realtime = sdk.realtime();
//!     realtime
//!         .connect(
//!             RealtimeOptions::default(),
//!             RealtimeHandlers::new().on_reconnect_failed(|| eprintln!("stream gave up")),
//!         )
//!         .await?;
//!     realtime.on_datasource_updates(|update| println!("datasource: {update}"))?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod notifications;
pub mod realtime;
pub mod sdk;
pub mod transport;

// Re-export commonly used types
pub use auth::Credentials;
pub use config::{AuthUpdate, ClientConfig, SharedConfig};
pub use error::{SdkError, SdkResult};
pub use crate::http::ApiClient;
pub use notifications::{CreateNotification, Notification, Notifications};
pub use realtime::{
    ConnectionState, EventEnvelope, NamedEvent, ReadyState, RealtimeClient, RealtimeHandlers,
    RealtimeMessage, RealtimeOptions, Subscription,
};
pub use sdk::DataTamer;
pub use transport::{ApiRequest, Method, Transport};

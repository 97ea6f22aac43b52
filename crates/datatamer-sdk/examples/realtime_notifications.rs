//! Realtime Notifications Example
//!
//! Connects to the event stream, prints notifications and datasource updates
//! as they arrive and marks everything read on exit.
//!
//! Run with:
//! `DATATAMER_URL=https://app.datatamer.ai DATATAMER_API_KEY=... cargo run -p datatamer-sdk --example realtime_notifications`

use std::time::Duration;

use datatamer_sdk::{
    ClientConfig, DataTamer,
    realtime::{RealtimeHandlers, RealtimeOptions},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let base_url =
        std::env::var("DATATAMER_URL").unwrap_or_else(|_| "https://app.datatamer.ai".into());
    let mut config = ClientConfig::new(base_url);
    if let Ok(key) = std::env::var("DATATAMER_API_KEY") {
        config = config.api_key(key);
    }
    let sdk = DataTamer::new(config)?;

    let unread = sdk.notifications().list().await?;
    println!("{} notifications on record", unread.len());

    let realtime = sdk.realtime();
    realtime
        .connect(
            RealtimeOptions::default(),
            RealtimeHandlers::new()
                .on_open(|| println!("stream open"))
                .on_reconnect(|attempt| println!("reconnecting (attempt {attempt})"))
                .on_reconnect_failed(|| eprintln!("giving up on the stream")),
        )
        .await?;
    realtime.enable_auto_reconnect(Duration::from_secs(1), Duration::from_secs(30), 10);

    let notifications = realtime.on_notifications(|data| println!("notification: {data}"))?;
    let datasources = realtime.on_datasource_updates(|data| println!("datasource: {data}"))?;

    tokio::time::sleep(Duration::from_secs(60)).await;

    notifications.unsubscribe();
    datasources.unsubscribe();
    realtime.disconnect();

    sdk.notifications().mark_all_as_read().await?;
    Ok(())
}

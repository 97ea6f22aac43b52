//! Reconnect policy tests for the realtime client.
//!
//! Streams come from a scripted connector and time is paused, so every
//! backoff delay is exact.

mod common;

use std::{sync::Arc, time::Duration};

use common::{EventLog, MockConnector, init_tracing, settle, shared_config, wait};
use datatamer_sdk::{
    ClientConfig, ConnectionState, ReadyState, RealtimeClient, RealtimeHandlers, RealtimeOptions,
};
use parking_lot::Mutex;

fn fast_options(max_attempts: u32) -> RealtimeOptions {
    RealtimeOptions::new()
        .reconnect_interval(Duration::from_millis(10))
        .max_reconnect_attempts(max_attempts)
}

#[tokio::test(start_paused = true)]
async fn test_two_attempts_then_failed() {
    init_tracing();
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(fast_options(2), log.handlers())
        .await
        .expect("connect");
    wait(Duration::from_millis(200)).await;

    assert_eq!(
        log.entries(),
        vec!["error", "reconnect:1", "error", "reconnect:2", "error", "failed"]
    );
    assert_eq!(connector.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_default_policy_retries_five_times() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(RealtimeOptions::default(), log.handlers())
        .await
        .expect("connect");

    wait(Duration::from_millis(2_999)).await;
    assert_eq!(connector.open_count(), 1);

    wait(Duration::from_secs(60)).await;
    let reconnects: Vec<_> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("reconnect:"))
        .collect();
    assert_eq!(
        reconnects,
        vec![
            "reconnect:1",
            "reconnect:2",
            "reconnect:3",
            "reconnect:4",
            "reconnect:5"
        ]
    );
    assert_eq!(log.count("failed"), 1);
    assert_eq!(log.entries().last().map(String::as_str), Some("failed"));
    assert_eq!(connector.open_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_disabled() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(fast_options(5).reconnect(false), log.handlers())
        .await
        .expect("connect");
    wait(Duration::from_secs(1)).await;

    assert_eq!(log.entries(), vec!["error"]);
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_fails_immediately() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(fast_options(0), log.handlers())
        .await
        .expect("connect");
    wait(Duration::from_secs(1)).await;

    assert_eq!(log.entries(), vec!["error", "failed"]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_is_open_failure() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(
        ClientConfig::new("not a url").into_shared(),
        connector.clone(),
    );
    let log = EventLog::new();

    client
        .connect(fast_options(2), log.handlers())
        .await
        .expect("connect");
    wait(Duration::from_millis(200)).await;

    assert_eq!(
        log.entries(),
        vec!["error", "reconnect:1", "error", "reconnect:2", "error", "failed"]
    );
    assert_eq!(connector.open_count(), 0);
    assert_eq!(
        client.get_connection_state(),
        ConnectionState {
            connected: false,
            ready_state: Some(ReadyState::Closed),
            reconnect_attempts: 2,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_counter_resets_after_successful_open() {
    let connector = MockConnector::new();
    connector.push_fail("refused");
    connector.push_fail("refused");
    let live = connector.push_live();

    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();
    client
        .connect(fast_options(5), log.handlers())
        .await
        .expect("connect");

    wait(Duration::from_millis(50)).await;
    assert_eq!(
        log.entries(),
        vec!["error", "reconnect:1", "error", "reconnect:2", "open"]
    );
    let state = client.get_connection_state();
    assert!(state.connected);
    assert_eq!(state.ready_state, Some(ReadyState::Open));
    assert_eq!(state.reconnect_attempts, 0);

    log.clear();
    live.close();
    settle().await;
    assert_eq!(log.entries(), vec!["error", "reconnect:1"]);

    wait(Duration::from_secs(1)).await;
    assert_eq!(log.count("failed"), 1);
    assert_eq!(log.entries().iter().filter(|e| e.starts_with("reconnect:")).count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(
            fast_options(5).reconnect_interval(Duration::from_secs(1)),
            log.handlers(),
        )
        .await
        .expect("connect");
    settle().await;
    assert_eq!(log.entries(), vec!["error", "reconnect:1"]);

    client.disconnect();
    wait(Duration::from_secs(30)).await;

    assert_eq!(log.entries(), vec!["error", "reconnect:1", "close"]);
    assert_eq!(connector.open_count(), 1);

    client.disconnect();
    assert_eq!(log.count("close"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_error_handler_stops_retry() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    let handle = client.clone();
    let handlers = log.handlers().on_error(move |_| handle.disconnect());
    client
        .connect(fast_options(5), handlers)
        .await
        .expect("connect");
    wait(Duration::from_secs(1)).await;

    assert_eq!(log.entries(), vec!["close"]);
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_reconnect_handler_stops_retry() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    let handle = client.clone();
    let reconnects = log.clone();
    let handlers = log.handlers().on_reconnect(move |attempt| {
        reconnects.push(format!("reconnect:{attempt}"));
        handle.disconnect();
    });
    client
        .connect(fast_options(5), handlers)
        .await
        .expect("connect");
    wait(Duration::from_secs(1)).await;

    assert_eq!(log.entries(), vec!["error", "reconnect:1", "close"]);
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_utf8_at_end_of_stream_is_reported() {
    let connector = MockConnector::new();
    let live = connector.push_live();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&errors);

    client
        .connect(
            fast_options(5).reconnect(false),
            RealtimeHandlers::new().on_error(move |err| recorded.lock().push(err.to_string())),
        )
        .await
        .expect("connect");
    settle().await;

    // The last line only completes when the stream ends.
    live.send_bytes(b"data: \xff\r");
    live.close();
    settle().await;

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Invalid UTF-8"), "got {errors:?}");
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_does_not_disturb_new_session() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(fast_options(5), log.handlers())
        .await
        .expect("connect");
    settle().await;
    client.disconnect();

    let live = connector.push_live();
    client
        .connect(fast_options(5), log.handlers())
        .await
        .expect("reconnect");
    wait(Duration::from_millis(100)).await;

    // The timer from the first session never fires a second open.
    assert_eq!(connector.open_count(), 2);
    assert!(client.is_connected_to_stream());
    drop(live);
}

#[tokio::test(start_paused = true)]
async fn test_connected_flag_transitions() {
    let connector = MockConnector::new();
    let live = connector.push_live();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    assert!(!client.is_connected_to_stream());
    assert_eq!(client.get_connection_state().ready_state, None);

    client
        .connect(fast_options(5), log.handlers())
        .await
        .expect("connect");
    assert_eq!(
        client.get_connection_state().ready_state,
        Some(ReadyState::Connecting)
    );
    settle().await;
    assert!(client.is_connected_to_stream());

    live.fail("connection reset");
    settle().await;
    assert!(!client.is_connected_to_stream());
    let state = client.get_connection_state();
    assert!(!state.connected);
    assert_eq!(state.ready_state, Some(ReadyState::Closed));
    assert_eq!(state.reconnect_attempts, 1);

    let second = connector.push_live();
    wait(Duration::from_millis(20)).await;
    assert!(client.is_connected_to_stream());

    client.disconnect();
    assert!(!client.is_connected_to_stream());
    assert_eq!(client.get_connection_state().ready_state, None);
    drop(second);
}

#[tokio::test(start_paused = true)]
async fn test_credentials_read_on_each_attempt() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());

    client
        .connect(fast_options(1), EventLog::new().handlers())
        .await
        .expect("connect");
    settle().await;

    client.set_session_token("session-2");
    client.set_api_key("dt_key");
    wait(Duration::from_millis(100)).await;

    let urls = connector.opened_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(
        urls[0].as_str(),
        "https://app.example.com/api/sse?token=session-1"
    );
    assert_eq!(
        urls[1].as_str(),
        "https://app.example.com/api/sse?token=session-2&apiKey=dt_key"
    );
}

#[tokio::test(start_paused = true)]
async fn test_last_event_id_sent_on_reconnect() {
    let connector = MockConnector::new();
    let first = connector.push_live();
    let second = connector.push_live();

    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    client
        .connect(fast_options(3), EventLog::new().handlers())
        .await
        .expect("connect");
    settle().await;

    first.send("id: evt-7\nevent: notification\ndata: {}\n\n");
    settle().await;
    first.close();
    wait(Duration::from_millis(20)).await;

    assert_eq!(
        connector.last_event_ids(),
        vec![None, Some("evt-7".to_string())]
    );
    assert!(client.is_connected_to_stream());
    drop(second);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_delays() {
    let connector = MockConnector::new();
    let client = RealtimeClient::with_connector(shared_config(), connector.clone());
    let log = EventLog::new();

    client
        .connect(fast_options(1).reconnect(false), log.handlers())
        .await
        .expect("connect");
    client.enable_auto_reconnect(Duration::from_millis(100), Duration::from_millis(200), 3);
    settle().await;

    // Delays: 100, 150, 200 ms.
    wait(Duration::from_millis(99)).await;
    assert_eq!(connector.open_count(), 1);
    wait(Duration::from_millis(2)).await;
    assert_eq!(connector.open_count(), 2);
    wait(Duration::from_millis(148)).await;
    assert_eq!(connector.open_count(), 2);
    wait(Duration::from_millis(2)).await;
    assert_eq!(connector.open_count(), 3);
    wait(Duration::from_millis(200)).await;
    assert_eq!(connector.open_count(), 4);

    assert_eq!(log.count("failed"), 1);
    assert!(Arc::strong_count(&connector) >= 1);
}

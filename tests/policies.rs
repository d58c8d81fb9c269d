// tests/policies.rs

//! Error and cancellation policy, observed end to end.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde_json::{json, Value};

use common::{ServerError, TodoServer};
use message_bridge::{
    // ---
    create_command_message,
    create_memory_transport,
    BridgeError,
    BridgeOptions,
    ErrorReason,
    MessageBridge,
    RequestOptions,
    Result,
};

fn failing() -> RequestOptions {
    RequestOptions::new("FailingCommand", json!({}))
}

fn slow(delay_ms: u64) -> RequestOptions {
    RequestOptions::new("SlowQuery", json!({ "delayMs": delay_ms }))
}

#[tokio::test]
async fn test_bare_send_rejects_on_server_error() -> Result<()> {
    // ---
    let server = TodoServer::start("test_bare_send_rejects").await?;

    let err = server
        .bridge
        .send_command::<_, Value>(failing())
        .await
        .unwrap_err();

    let record = err.record().expect("request error carries its record");
    assert!(record.is_error);
    assert!(!err.is_timeout());
    assert_eq!(
        record.error,
        Some(ErrorReason::Remote(json!({
            "message": "Error in command handler for 'FailingCommand'"
        })))
    );
    assert!(err.to_string().contains("FailingCommand"));

    server.shutdown().await
}

#[tokio::test]
async fn test_avoid_throw_resolves_with_error_payload() -> Result<()> {
    // ---
    let options = BridgeOptions {
        avoid_throw_on_non_tracked_error: Some(true),
        ..BridgeOptions::default()
    };
    let server = TodoServer::start_with("test_avoid_throw", options).await?;

    let raw = server
        .bridge
        .send_message(create_command_message("FailingCommand", json!({})), failing())
        .await?;
    assert_eq!(
        raw,
        Some(json!({ "message": "Error in command handler for 'FailingCommand'" }))
    );

    let typed: Option<Value> = server.bridge.send_command(failing()).await?;
    assert!(typed.is_none());

    server.shutdown().await
}

#[tokio::test]
async fn test_tracked_resolves_errors_unless_configured() -> Result<()> {
    // ---
    let server = TodoServer::start("test_tracked_resolves_errors").await?;

    let record = server
        .bridge
        .send_command_tracked::<_, Value, ServerError>(failing())
        .await?;
    assert!(record.is_error);
    assert!(record.error.unwrap().remote().unwrap().message.contains("FailingCommand"));

    server.bridge.set_options(BridgeOptions {
        throw_on_tracked_error: Some(true),
        ..BridgeOptions::default()
    });
    let err = server
        .bridge
        .send_command_tracked::<_, Value, ServerError>(failing())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Request(_)));

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_bare_send_timeout_rejects() -> Result<()> {
    // ---
    let server = TodoServer::start("test_bare_send_timeout").await?;

    let err = server
        .bridge
        .send_query::<_, Value>(slow(1000).with_timeout(Duration::from_millis(10)))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(
        err.record().unwrap().error,
        Some(ErrorReason::Local(
            "Timeout after 10ms (RequestOptions.timeout)".into()
        ))
    );

    server.shutdown().await
}

#[tokio::test]
async fn test_error_callbacks_fire_once() -> Result<()> {
    // ---
    let channel_errors = Arc::new(AtomicUsize::new(0));
    let request_errors = Arc::new(AtomicUsize::new(0));

    let counter = channel_errors.clone();
    let options = BridgeOptions::default().with_on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let server = TodoServer::start_with("test_error_callbacks", options).await?;

    let counter = request_errors.clone();
    let _ = server
        .bridge
        .send_command_tracked::<_, Value, Value>(failing().with_on_error(move |record| {
            assert!(record.is_error);
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await?;

    assert_eq!(channel_errors.load(Ordering::SeqCst), 1);
    assert_eq!(request_errors.load(Ordering::SeqCst), 1);

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight_hides_response() -> Result<()> {
    // ---
    let successes = Arc::new(AtomicUsize::new(0));
    let counter = successes.clone();
    let options = BridgeOptions::default().with_on_success(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let server = TodoServer::start_with("test_cancel_in_flight", options).await?;

    let created = server.bridge.create_query(slow(100))?;
    let (record, _) = tokio::join!(created.send_tracked(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        created.cancel();
    });
    let record = record?;

    assert!(record.cancelled);
    assert!(!record.is_error);
    assert!(record.response.is_none());
    assert!(record.response_message.is_some());
    assert_eq!(successes.load(Ordering::SeqCst), 0);

    // The server saw the request before it was cancelled.
    assert!(!server.received()[0].cancelled);

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight_with_response_allowed() -> Result<()> {
    // ---
    let successes = Arc::new(AtomicUsize::new(0));
    let counter = successes.clone();
    let server = TodoServer::start("test_cancel_in_flight_allowed").await?;

    let created = server.bridge.create_query(
        slow(100)
            .with_allow_response_value_when_cancelled(true)
            .with_call_on_success_when_request_is_cancelled(true)
            .with_on_success(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    )?;
    let (record, _) = tokio::join!(created.send_tracked(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        created.cancel();
    });
    let record = record?;

    assert!(record.cancelled);
    assert_eq!(record.response.unwrap()["done"], json!(true));
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_bare_send_resolves_none_when_cancelled_in_flight() -> Result<()> {
    // ---
    let server = TodoServer::start("test_bare_send_cancelled").await?;

    let created = server.bridge.create_query(slow(100))?;
    let (resp, _) = tokio::join!(created.send::<Value>(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        created.cancel();
    });
    assert!(resp?.is_none());

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_resolve_cancelled_treats_request_as_live() -> Result<()> {
    // ---
    let options = BridgeOptions {
        resolve_cancelled_non_tracked_request: Some(true),
        ..BridgeOptions::default()
    };
    let server = TodoServer::start_with("test_resolve_cancelled", options).await?;

    let created = server.bridge.create_query(slow(100))?;
    let (resp, _) = tokio::join!(created.send::<Value>(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        created.cancel();
    });
    assert_eq!(resp?.unwrap()["done"], json!(true));

    server.shutdown().await
}

#[tokio::test]
async fn test_send_cancelled_request_goes_out() -> Result<()> {
    // ---
    let server = TodoServer::start("test_send_cancelled_request").await?;

    // Request-level override
    let created = server
        .bridge
        .create_query(RequestOptions::new("EchoQuery", json!({ "n": 1 })).with_send_cancelled(true))?;
    created.cancel();
    let record = created.send_tracked().await?;

    assert!(record.cancelled);
    assert!(record.response.is_none());
    assert_eq!(record.response_message.unwrap().payload, json!({ "n": 1 }));

    // Channel-level default
    server.bridge.set_options(BridgeOptions {
        send_cancelled_request: Some(true),
        ..BridgeOptions::default()
    });
    let created = server
        .bridge
        .create_query(RequestOptions::new("EchoQuery", json!({ "n": 2 })))?;
    created.cancel();
    let resp: Option<Value> = created.send().await?;
    assert!(resp.is_none());

    let received = server.received();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|m| m.cancelled));

    // Request-level `false` wins over the channel default
    let created = server.bridge.create_query(
        RequestOptions::new("EchoQuery", json!({ "n": 3 })).with_send_cancelled(false),
    )?;
    created.cancel();
    assert!(created.send::<Value>().await?.is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(server.received().len(), 2);

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_error_callbacks() -> Result<()> {
    // ---
    let server = TodoServer::start("test_cancelled_error_callbacks").await?;

    for (call_when_cancelled, expected) in [(None, 0), (Some(true), 1)] {
        // ---
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        let mut options = slow(1000)
            .with_timeout(Duration::from_millis(50))
            .with_on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        options.call_on_error_when_request_is_cancelled = call_when_cancelled;

        let created = server.bridge.create_query(options)?;
        let (record, _) = tokio::join!(created.send_tracked(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            created.cancel();
        });
        let record = record?;

        assert!(record.is_error);
        assert!(record.cancelled);
        assert!(record.timed_out);
        assert_eq!(errors.load(Ordering::SeqCst), expected);
    }

    server.shutdown().await
}

#[tokio::test]
async fn test_transport_failure_settles_request() -> Result<()> {
    // ---
    let (transport, peer) = create_memory_transport("test_transport_failure");
    drop(peer);
    let bridge = MessageBridge::new(transport);
    bridge.connect().await?;

    let record = bridge
        .send_query_tracked::<_, Value, Value>(RequestOptions::new("EchoQuery", json!({})))
        .await?;

    assert!(record.is_error);
    assert!(!record.timed_out);
    let reason = record.error.as_ref().and_then(|e| e.local()).unwrap();
    assert!(reason.contains("memory peer dropped"), "{reason}");
    assert_eq!(bridge.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_by_track_id() -> Result<()> {
    // ---
    let server = TodoServer::start("test_cancel_by_track_id").await?;
    let bridge = server.bridge.clone();

    let created = bridge.create_query(slow(100))?;
    let track_id = created.track_id.clone();
    assert!(bridge.get_tracked_request_message(&track_id).is_none());

    let (record, _) = tokio::join!(created.send_tracked(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let tracked = bridge.get_tracked_request_message(&track_id).unwrap();
        assert!(!tracked.cancelled);
        assert!(bridge.cancel_request(&track_id));
        assert!(bridge.get_tracked_request_message(&track_id).unwrap().cancelled);
    });

    assert!(record?.cancelled);
    assert!(bridge.get_tracked_request_message(&track_id).is_none());
    assert!(!bridge.cancel_request(&track_id));

    server.shutdown().await
}

#[tokio::test]
async fn test_tracked_keeps_record_when_error_payload_does_not_decode() -> Result<()> {
    // ---
    let server = TodoServer::start("test_tracked_undecodable_error").await?;

    // The server answers with `{ "message": .. }`, which is not a String.
    let record = server
        .bridge
        .send_query_tracked::<_, Value, String>(RequestOptions::new("NoSuchQuery", json!({})))
        .await?;

    assert!(record.is_error);
    let reason = record.error.as_ref().and_then(|e| e.local()).unwrap();
    assert!(reason.starts_with("undecodable error payload"), "{reason}");
    assert!(reason.contains("NoSuchQuery not found"), "{reason}");
    assert!(record.error_message.unwrap().payload["message"]
        .as_str()
        .unwrap()
        .contains("NoSuchQuery"));

    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_timeout_formatter_may_call_back_into_bridge() -> Result<()> {
    // ---
    let slot: Arc<OnceLock<MessageBridge>> = Arc::new(OnceLock::new());
    let handle = slot.clone();
    let options = BridgeOptions::default().with_timeout_from_request_options_message(move |after| {
        let pending = handle.get().map_or(0, |bridge| bridge.pending_count());
        format!("gave up after {}ms ({pending} pending)", after.as_millis())
    });
    let server = TodoServer::start_with("test_timeout_formatter_reentry", options).await?;
    let _ = slot.set(server.bridge.clone());

    let record = server
        .bridge
        .send_query_tracked::<_, Value, Value>(slow(1000).with_timeout(Duration::from_millis(10)))
        .await?;

    assert!(record.timed_out);
    assert_eq!(
        record.error.as_ref().and_then(|e| e.local()),
        Some("gave up after 10ms (0 pending)")
    );

    server.shutdown().await
}

//! Transport lifecycle tests

use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use serde_json::json;

use super::{RecordingHandler, frame_json, next_frame, quiet_stream_config};
use crate::stream::StreamConfig;
use crate::transport::{CloseReason, SseTransport, TransportState};
use crate::{SessionRegistry, TransportError};
use mcp_sse_json_rpc::{JsonRpcNotification, JsonRpcRequest, RequestId};

fn ping(id: i64) -> JsonRpcRequest {
    JsonRpcRequest::new(RequestId::from(id), "ping")
}

#[tokio::test]
async fn test_send_before_start_is_invalid_state() {
    let handler = RecordingHandler::new();
    let transport = SseTransport::new("s1", handler, quiet_stream_config());
    assert_eq!(transport.state(), TransportState::Uninitialized);

    let err = transport.send(ping(1)).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidState {
            operation: "send",
            state: TransportState::Uninitialized
        }
    ));

    let err = transport.handle_incoming(b"{}").await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidState { .. }));
}

#[tokio::test]
async fn test_start_only_once() {
    let transport = SseTransport::new("s1", RecordingHandler::new(), quiet_stream_config());
    let _response = transport.start().unwrap();
    assert!(transport.is_open());

    let err = transport.start().unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidState {
            operation: "start",
            state: TransportState::Open
        }
    ));
}

#[tokio::test]
async fn test_frames_arrive_in_send_order() {
    let transport = SseTransport::new("s1", RecordingHandler::new(), quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    assert_eq!(
        next_frame(&mut body).await.unwrap(),
        "event: connected\ndata: {}\n\n"
    );

    for id in 1..=20 {
        transport.send(ping(id)).await.unwrap();
    }
    transport
        .send(JsonRpcNotification::new("notifications/progress"))
        .await
        .unwrap();

    for id in 1..=20 {
        let frame = frame_json(&next_frame(&mut body).await.unwrap());
        assert_eq!(frame["id"], json!(id));
    }
    let frame = frame_json(&next_frame(&mut body).await.unwrap());
    assert_eq!(frame["method"], "notifications/progress");
    assert!(frame.get("id").is_none());
}

#[tokio::test]
async fn test_concurrent_senders_do_not_interleave_frames() {
    let transport = SseTransport::new("s1", RecordingHandler::new(), quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    let mut tasks = Vec::new();
    for worker in 0..4i64 {
        let transport = Arc::clone(&transport);
        tasks.push(tokio::spawn(async move {
            for n in 0..25i64 {
                transport.send(ping(worker * 100 + n)).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut per_worker: Vec<Vec<i64>> = vec![Vec::new(); 4];
    for _ in 0..100 {
        let frame = frame_json(&next_frame(&mut body).await.unwrap());
        let id = frame["id"].as_i64().unwrap();
        per_worker[(id / 100) as usize].push(id % 100);
    }
    for ids in per_worker {
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let handler = RecordingHandler::new();
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    transport.send(ping(1)).await.unwrap();
    transport.close();
    transport.close();

    // Frames queued before the close are still delivered
    assert_eq!(frame_json(&next_frame(&mut body).await.unwrap())["id"], 1);
    assert!(next_frame(&mut body).await.is_none());
    drop(body);

    assert_eq!(handler.close_reasons("s1"), vec![CloseReason::Explicit]);
    assert_eq!(transport.state(), TransportState::Closed);

    let err = transport.send(ping(2)).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::InvalidState {
            state: TransportState::Closed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_peer_disconnect_then_close_fires_once() {
    let handler = RecordingHandler::new();
    let registry = SessionRegistry::new();
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, quiet_stream_config());
    registry.register(Arc::clone(&transport)).unwrap();

    let body = transport.start().unwrap().into_body();
    drop(body);

    assert!(transport.is_closed());
    assert!(registry.lookup("s1").is_err());
    transport.close();

    assert_eq!(
        handler.close_reasons("s1"),
        vec![CloseReason::PeerDisconnected]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_racing_peer_disconnect() {
    for _ in 0..50 {
        let handler = RecordingHandler::new();
        let transport = SseTransport::new("s1", Arc::clone(&handler) as _, quiet_stream_config());
        let body = transport.start().unwrap().into_body();

        let closer = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.close() })
        };
        let dropper = tokio::spawn(async move { drop(body) });
        closer.await.unwrap();
        dropper.await.unwrap();

        assert_eq!(handler.close_reasons("s1").len(), 1);
    }
}

#[tokio::test]
async fn test_incoming_message_reaches_handler() {
    let handler = RecordingHandler::new();
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    transport
        .handle_incoming(br#"{"jsonrpc":"2.0","method":"echo","params":{"x":1},"id":"r1"}"#)
        .await
        .unwrap();

    let reply = frame_json(&next_frame(&mut body).await.unwrap());
    assert_eq!(reply["id"], "r1");
    assert_eq!(reply["result"]["echo"], json!({"x": 1}));

    let err = transport.handle_incoming(b"not json").await.unwrap_err();
    assert!(matches!(err, TransportError::MalformedMessage(_)));
    assert_eq!(handler.error_kinds(), vec!["MalformedMessage"]);
    assert_eq!(handler.messages_for("s1").len(), 1);
}

#[tokio::test]
async fn test_incoming_message_is_delivered_unchanged() {
    let handler = RecordingHandler::new();
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    let bodies = [
        json!({"extra": true, "jsonrpc": "2.0", "method": "notifications/x"}),
        json!({
            "jsonrpc": "2.0",
            "method": "echo",
            "params": [1, 2],
            "id": 18446744073709551615_u64,
            "_meta": {"progressToken": "t"}
        }),
    ];
    for body in &bodies {
        transport
            .handle_incoming(body.to_string().as_bytes())
            .await
            .unwrap();
    }

    let received: Vec<_> = handler
        .messages_for("s1")
        .iter()
        .map(|message| serde_json::to_value(message).unwrap())
        .collect();
    assert_eq!(received, bodies);

    let reply = frame_json(&next_frame(&mut body).await.unwrap());
    assert_eq!(reply["id"], json!(18446744073709551615_u64));
}

#[tokio::test]
async fn test_close_releases_sender_waiting_on_full_channel() {
    let handler = RecordingHandler::new();
    let config = StreamConfig {
        channel_buffer_size: 1,
        keepalive_interval: None,
        idle_timeout: None,
    };
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, config);
    // The body stays alive but is never polled, like a client that stopped reading
    let _body = transport.start().unwrap().into_body();

    transport.send(ping(1)).await.unwrap();
    let blocked = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.send(ping(2)).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!blocked.is_finished());

    transport.close();
    let result = tokio::time::timeout(Duration::from_secs(2), blocked)
        .await
        .expect("send still blocked after close")
        .unwrap();
    assert!(result.is_ok());
    assert!(transport.is_closed());
    assert_eq!(handler.close_reasons("s1"), vec![CloseReason::Explicit]);
    assert!(handler.error_kinds().is_empty());
}

#[tokio::test]
async fn test_blocked_send_returns_ok_when_stream_goes_away() {
    let handler = RecordingHandler::new();
    let registry = SessionRegistry::new();
    let config = StreamConfig {
        channel_buffer_size: 1,
        keepalive_interval: None,
        idle_timeout: None,
    };
    let transport = SseTransport::new("s1", Arc::clone(&handler) as _, config);
    registry.register(Arc::clone(&transport)).unwrap();
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    // Fill the channel, then block a sender on it
    transport.send(ping(1)).await.unwrap();
    let blocked = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.send(ping(2)).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    drop(body);
    assert!(blocked.await.unwrap().is_ok());
    assert!(transport.is_closed());
    assert!(registry.is_empty());
    assert_eq!(handler.close_reasons("s1").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_comments() {
    let config = StreamConfig {
        keepalive_interval: Some(Duration::from_secs(30)),
        ..StreamConfig::default()
    };
    let transport = SseTransport::new("s1", RecordingHandler::new(), config);
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    assert_eq!(next_frame(&mut body).await.unwrap(), ": keepalive\n\n");
    assert_eq!(next_frame(&mut body).await.unwrap(), ": keepalive\n\n");

    // Keep-alives interleave with data without splitting frames
    transport.send(ping(7)).await.unwrap();
    assert_eq!(frame_json(&next_frame(&mut body).await.unwrap())["id"], 7);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_closes_session() {
    let handler = RecordingHandler::new();
    let registry = SessionRegistry::new();
    let config = StreamConfig {
        keepalive_interval: Some(Duration::from_secs(10)),
        idle_timeout: Some(Duration::from_secs(60)),
        ..StreamConfig::default()
    };
    let transport = SseTransport::new("idle", Arc::clone(&handler) as _, config);
    registry.register(Arc::clone(&transport)).unwrap();
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    tokio::time::sleep(Duration::from_secs(45)).await;
    transport.send(ping(1)).await.unwrap();

    // Keep-alives do not count as activity; the message did
    let mut frames = Vec::new();
    while let Some(frame) = next_frame(&mut body).await {
        frames.push(frame);
    }
    assert!(frames.iter().any(|frame| frame.starts_with("data: ")));
    assert!(frames.iter().any(|frame| frame == ": keepalive\n\n"));

    assert!(transport.is_closed());
    assert!(registry.is_empty());
    assert_eq!(handler.close_reasons("idle"), vec![CloseReason::IdleTimeout]);
}

#[tokio::test]
async fn test_disabled_idle_timeout_keeps_session() {
    let transport = SseTransport::new("s1", RecordingHandler::new(), quiet_stream_config());
    let mut body = transport.start().unwrap().into_body();
    next_frame(&mut body).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_millis(50), body.frame()).await;
    assert!(waited.is_err());
    assert!(transport.is_open());
}

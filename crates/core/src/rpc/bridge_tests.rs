use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use super::*;
use crate::events::EventFanOut;

fn socket_path() -> PathBuf {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let path = dir.path().join("rpc.sock");
    // Leak the tempdir so it outlives the test; each test gets a fresh path.
    std::mem::forget(dir);
    path
}

#[tokio::test]
async fn request_round_trip_against_echo_server() {
    let path = socket_path();
    let listener = UnixListener::bind(&path).unwrap_or_else(|e| panic!("bind: {e}"));

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                let req: Value = serde_json::from_str(line.trim_end()).unwrap();
                let id = req["id"].clone();
                let response = json!({"jsonrpc": "2.0", "id": id, "result": {"ok": true}});
                let _ = write_half.write_all(format!("{response}\n").as_bytes()).await;
            }
        }
    });

    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());
    bridge.connect().await.expect("connect");

    let result = bridge
        .request("ping", json!({}), Duration::from_secs(2))
        .await
        .expect("request succeeds");
    assert_eq!(result, json!({"ok": true}));
}

#[tokio::test]
async fn request_times_out_without_response() {
    let path = socket_path();
    let listener = UnixListener::bind(&path).unwrap_or_else(|e| panic!("bind: {e}"));
    tokio::spawn(async move {
        let _keep = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());
    bridge.connect().await.expect("connect");

    let result = bridge.request("slow", json!({}), Duration::from_millis(50)).await;
    assert_eq!(result, Err(ErrorCode::RequestTimeout));
    assert!(bridge.0.pending.lock().unwrap().is_empty());
}

#[tokio::test]
async fn request_queues_while_disconnected() {
    let path = socket_path();
    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());

    // No listener yet: request() should queue rather than panic or hang
    // forever past its own timeout.
    let result = bridge.request("ping", json!({}), Duration::from_millis(50)).await;
    assert_eq!(result, Err(ErrorCode::RequestTimeout));
    assert_eq!(bridge.0.queued.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_frame_recorded_without_breaking_stream() {
    let path = socket_path();
    let listener = UnixListener::bind(&path).unwrap_or_else(|e| panic!("bind: {e}"));

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let (read_half, mut write_half) = stream.into_split();
            let _ = write_half.write_all(b"not json\n").await;
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                let req: Value = serde_json::from_str(line.trim_end()).unwrap();
                let id = req["id"].clone();
                let response = json!({"jsonrpc": "2.0", "id": id, "result": 42});
                let _ = write_half.write_all(format!("{response}\n").as_bytes()).await;
            }
        }
    });

    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());
    bridge.connect().await.expect("connect");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = bridge.request("ping", json!({}), Duration::from_secs(2)).await;
    assert_eq!(result, Ok(json!(42)));

    let history = bridge.history();
    assert!(history.iter().any(|e| matches!(e, HistoryEntry::Error { id: None, .. })));
}

#[tokio::test]
async fn disconnect_fails_in_flight_requests() {
    let path = socket_path();
    let listener = UnixListener::bind(&path).unwrap_or_else(|e| panic!("bind: {e}"));
    tokio::spawn(async move {
        let _keep = listener.accept().await;
        std::future::pending::<()>().await;
    });

    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());
    bridge.connect().await.expect("connect");

    let bridge2 = bridge.clone();
    let handle = tokio::spawn(async move { bridge2.request("slow", json!({}), Duration::from_secs(5)).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    bridge.disconnect().await;

    let result = handle.await.expect("join");
    assert_eq!(result, Err(ErrorCode::TransportError));
    assert!(!bridge.is_connected());
}

#[tokio::test]
async fn health_check_parses_first_json_line() {
    let path = socket_path();
    let listener = UnixListener::bind(&path).unwrap_or_else(|e| panic!("bind: {e}"));

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            let _ = reader.read_line(&mut line).await;
            assert_eq!(line.trim_end(), "health");
            let _ = write_half.write_all(b"{\"status\":\"ok\"}\n").await;
        }
    });

    let events = EventFanOut::default();
    let bridge = RpcBridge::new(path, events.sender());
    let result = bridge.health_check().await.expect("health check");
    assert_eq!(result, json!({"status": "ok"}));
}

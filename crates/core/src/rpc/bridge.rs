// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C6 — RpcBridge (§4.4): a JSON-RPC 2.0 client over a Unix domain socket,
//! talking to an out-of-process collaborator (the agent's "memory server").
//! Newline-delimited framing, a pending-request table keyed by monotone id,
//! exponential-backoff reconnect, and a bounded history ring.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::events::{Event, EventSender};
use crate::rpc::history::{self, HistoryEntry, HistoryRing};

/// Default per-request timeout (§4.4: "request(method, params, timeoutMs=30000)").
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

struct Pending {
    resolver: oneshot::Sender<Result<Value, String>>,
}

struct QueuedFrame {
    id: u64,
    line: String,
}

struct Inner {
    socket_path: PathBuf,
    events: EventSender,
    max_reconnect_attempts: u32,

    write_half: AsyncMutex<Option<tokio::net::unix::OwnedWriteHalf>>,
    pending: StdMutex<HashMap<u64, Pending>>,
    queued: StdMutex<VecDeque<QueuedFrame>>,
    history: StdMutex<HistoryRing>,
    next_id: AtomicU64,
    connected: AtomicBool,
    reconnect_attempts: AtomicU32,
    reader_cancel: StdMutex<Option<CancellationToken>>,
}

/// Cheaply cloneable handle to one RPC bridge. Clones share the same
/// connection, pending table, and history ring.
#[derive(Clone)]
pub struct RpcBridge(Arc<Inner>);

impl RpcBridge {
    pub fn new(socket_path: PathBuf, events: EventSender) -> Self {
        Self::with_max_reconnect(socket_path, events, DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }

    pub fn with_max_reconnect(socket_path: PathBuf, events: EventSender, max_reconnect_attempts: u32) -> Self {
        Self(Arc::new(Inner {
            socket_path,
            events,
            max_reconnect_attempts,
            write_half: AsyncMutex::new(None),
            pending: StdMutex::new(HashMap::new()),
            queued: StdMutex::new(VecDeque::new()),
            history: StdMutex::new(HistoryRing::default()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            reader_cancel: StdMutex::new(None),
        }))
    }

    pub fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.0.history.lock().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    /// Dial the socket within `CONNECT_TIMEOUT`. On success, spawns the
    /// reader task and flushes any frames that were queued while
    /// disconnected.
    pub async fn connect(&self) -> Result<(), ErrorCode> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.0.socket_path))
            .await
            .map_err(|_| ErrorCode::TransportError)?
            .map_err(|_| ErrorCode::TransportError)?;

        let (read_half, write_half) = stream.into_split();
        *self.0.write_half.lock().await = Some(write_half);
        self.0.connected.store(true, Ordering::SeqCst);
        self.0.reconnect_attempts.store(0, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        *self.0.reader_cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());
        self.spawn_reader(read_half, cancel);

        self.drain_queue().await;
        Ok(())
    }

    /// Tear down the connection and fail every in-flight (not queued)
    /// pending request with [`ErrorCode::TransportError`].
    pub async fn disconnect(&self) {
        *self.0.write_half.lock().await = None;
        self.0.connected.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.0.reader_cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            cancel.cancel();
        }
        self.fail_all_pending("connection closed");
    }

    /// Issue a JSON-RPC request. If disconnected, the frame is queued and
    /// sent once `connect()` succeeds (automatically, via reconnect, or
    /// manually); either way the call blocks up to `timeout` for a response.
    pub async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, ErrorCode> {
        let id = self.0.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.0.pending.lock().unwrap_or_else(|e| e.into_inner()).insert(id, Pending { resolver: tx });
        self.push_history(HistoryEntry::Request {
            id,
            method: method.to_string(),
            params: params.clone(),
            timestamp: history::now_millis(),
        });

        let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let line = format!("{frame}\n");

        if self.write_frame(&line).await.is_err() {
            self.0
                .queued
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(QueuedFrame { id, line });
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => {
                self.push_history(HistoryEntry::Error {
                    id: Some(id),
                    message: message.clone(),
                    timestamp: history::now_millis(),
                });
                Err(ErrorCode::Internal)
            }
            Ok(Err(_canceled)) => Err(ErrorCode::TransportError),
            Err(_elapsed) => {
                self.0.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
                self.push_history(HistoryEntry::Error {
                    id: Some(id),
                    message: "request timed out".into(),
                    timestamp: history::now_millis(),
                });
                Err(ErrorCode::RequestTimeout)
            }
        }
    }

    pub async fn request_default(&self, method: &str, params: Value) -> Result<Value, ErrorCode> {
        self.request(method, params, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Short-lived, separate connection: write the literal `health` probe
    /// and parse the first JSON line returned, within `HEALTH_TIMEOUT`.
    pub async fn health_check(&self) -> Result<Value, ErrorCode> {
        let stream = tokio::time::timeout(HEALTH_TIMEOUT, UnixStream::connect(&self.0.socket_path))
            .await
            .map_err(|_| ErrorCode::TransportError)?
            .map_err(|_| ErrorCode::TransportError)?;

        let (read_half, mut write_half) = stream.into_split();
        tokio::time::timeout(HEALTH_TIMEOUT, write_half.write_all(b"health\n"))
            .await
            .map_err(|_| ErrorCode::TransportError)?
            .map_err(|_| ErrorCode::TransportError)?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        let n = tokio::time::timeout(HEALTH_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| ErrorCode::RequestTimeout)?
            .map_err(|_| ErrorCode::TransportError)?;
        if n == 0 {
            return Err(ErrorCode::TransportError);
        }

        serde_json::from_str(line.trim_end()).map_err(|_| ErrorCode::MalformedFrame)
    }

    async fn write_frame(&self, line: &str) -> Result<(), ErrorCode> {
        let mut guard = self.0.write_half.lock().await;
        match guard.as_mut() {
            Some(write_half) => write_half
                .write_all(line.as_bytes())
                .await
                .map_err(|_| ErrorCode::TransportError),
            None => Err(ErrorCode::TransportError),
        }
    }

    async fn drain_queue(&self) {
        let frames: Vec<QueuedFrame> =
            self.0.queued.lock().unwrap_or_else(|e| e.into_inner()).drain(..).collect();
        for frame in frames {
            if self.write_frame(&frame.line).await.is_err() {
                self.0.queued.lock().unwrap_or_else(|e| e.into_inner()).push_back(frame);
                break;
            }
            let _ = frame.id;
        }
    }

    fn push_history(&self, entry: HistoryEntry) {
        self.0.history.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    fn fail_all_pending(&self, reason: &str) {
        let pending: HashMap<u64, Pending> =
            std::mem::take(&mut *self.0.pending.lock().unwrap_or_else(|e| e.into_inner()));
        for (_, entry) in pending {
            let _ = entry.resolver.send(Err(reason.to_string()));
        }
    }

    fn spawn_reader(&self, read_half: tokio::net::unix::OwnedReadHalf, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                let mut line = String::new();
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = reader.read_line(&mut line) => {
                        match result {
                            Ok(0) => {
                                this.handle_disconnect("remote closed connection").await;
                                return;
                            }
                            Ok(_) => this.handle_line(&line),
                            Err(_) => {
                                this.handle_disconnect("read error").await;
                                return;
                            }
                        }
                    }
                }
            }
        });
    }

    fn handle_line(&self, line: &str) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                self.push_history(HistoryEntry::Error {
                    id: None,
                    message: "malformed frame".into(),
                    timestamp: history::now_millis(),
                });
                self.0.events.emit(Event::RpcError { message: "malformed rpc frame".to_string() });
                return;
            }
        };

        let id = value.get("id").and_then(Value::as_u64);
        match id {
            Some(id) => self.handle_response(id, value),
            None => self.handle_notification(value),
        }
    }

    fn handle_response(&self, id: u64, value: Value) {
        let pending = self.0.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
        let Some(pending) = pending else {
            debug!(id, "rpc response for unknown request id");
            return;
        };

        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("rpc error")
                .to_string();
            self.push_history(HistoryEntry::Error {
                id: Some(id),
                message: message.clone(),
                timestamp: history::now_millis(),
            });
            let _ = pending.resolver.send(Err(message));
        } else {
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            self.push_history(HistoryEntry::Response {
                id,
                result_preview: history::preview(&result),
                timestamp: history::now_millis(),
            });
            let _ = pending.resolver.send(Ok(result));
        }
    }

    fn handle_notification(&self, value: Value) {
        let method = value.get("method").and_then(Value::as_str).map(str::to_string);
        let Some(method) = method else {
            self.push_history(HistoryEntry::Error {
                id: None,
                message: "malformed frame".into(),
                timestamp: history::now_millis(),
            });
            return;
        };
        let params = value.get("params").cloned().unwrap_or(Value::Null);
        self.push_history(HistoryEntry::Notification {
            method: method.clone(),
            params: params.clone(),
            timestamp: history::now_millis(),
        });
        self.0.events.emit(Event::RpcNotification { method, params });
    }

    async fn handle_disconnect(&self, reason: &str) {
        self.0.connected.store(false, Ordering::SeqCst);
        *self.0.write_half.lock().await = None;
        self.fail_all_pending(reason);
        self.0.events.emit(Event::RpcError { message: reason.to_string() });
        self.spawn_reconnect();
    }

    fn spawn_reconnect(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let attempt = this.0.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
                if attempt >= this.0.max_reconnect_attempts {
                    warn!(attempt, "rpc bridge giving up reconnect attempts");
                    return;
                }
                let backoff = (BACKOFF_BASE * 2u32.saturating_pow(attempt)).min(BACKOFF_CAP);
                tokio::time::sleep(backoff).await;
                if this.connect().await.is_ok() {
                    debug!(attempt, "rpc bridge reconnected");
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C7 — in-process pub/sub glue (§4.5) distributing events from
//! LiveCapture/SessionSupervisor/AutonomousController/RpcBridge to TUI
//! panes and the dashboard WebSocket broadcaster.
//!
//! Delivery is best-effort and at-most-once per subscriber: producers never
//! call subscriber code directly, and a slow subscriber drops the oldest
//! backlog entries rather than block a producer.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::controller::ExitReason;
use crate::error::ErrorCode;

/// Default bounded backlog per subscriber (§4.5).
pub const DEFAULT_BACKLOG: usize = 1000;

/// Events fanned out to TUI panes and the dashboard WS broadcaster (§4.5).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    #[serde(rename = "capture:data")]
    CaptureData {
        session: String,
        #[serde(skip)]
        bytes: Bytes,
    },
    #[serde(rename = "capture:sessionDead")]
    CaptureSessionDead { session: String },
    #[serde(rename = "capture:error")]
    CaptureError { session: String, error: ErrorCode },
    #[serde(rename = "auto:permissionHandled")]
    AutoPermissionHandled { session: String, rule_id: String },
    #[serde(rename = "auto:completed")]
    AutoCompleted { session: String, exit_reason: ExitReason },
    #[serde(rename = "supervisor:sessionStarted")]
    SupervisorSessionStarted { session: String },
    #[serde(rename = "supervisor:sessionStopped")]
    SupervisorSessionStopped { session: String },
    #[serde(rename = "rpc:notification")]
    RpcNotification { method: String, params: serde_json::Value },
    #[serde(rename = "rpc:error")]
    RpcError { message: String },
}

/// Producer-side handle. Cloneable; cheap (wraps a `broadcast::Sender`).
#[derive(Clone)]
pub struct EventSender(broadcast::Sender<Event>);

impl EventSender {
    /// Emit an event. Never blocks; if there are no subscribers this is a
    /// silent no-op (matches `tokio::sync::broadcast::Sender::send`).
    pub fn emit(&self, event: Event) {
        let _ = self.0.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.receiver_count()
    }
}

/// Subscriber-side handle. Each subscriber gets its own lag-tolerant view:
/// if it falls more than `capacity` events behind, the oldest are dropped
/// and `recv` silently resumes from the new oldest entry.
pub struct EventSubscriber(broadcast::Receiver<Event>);

impl EventSubscriber {
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.0.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// The fanout hub: holds the broadcast channel subscribers attach to.
pub struct EventFanOut {
    tx: broadcast::Sender<Event>,
}

impl EventFanOut {
    pub fn new(backlog: usize) -> Self {
        let (tx, _rx) = broadcast::channel(backlog.max(1));
        Self { tx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender(self.tx.clone())
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber(self.tx.subscribe())
    }
}

impl Default for EventFanOut {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG)
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

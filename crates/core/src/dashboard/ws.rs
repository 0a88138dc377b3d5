// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /ws` — the dashboard's event broadcaster (§6). Every [`Event`] fanned
//! out over [`crate::events::EventFanOut`] is forwarded as
//! `{type, data, timestamp}` JSON. Auth is satisfied either by a `?token=`
//! query parameter on the upgrade request, or by the first inbound message
//! being `{"token": "..."}`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;

use crate::transport::auth::{validate_ws_auth, validate_ws_query};
use crate::transport::state::AppState;

const AUTH_GRACE: Duration = Duration::from_secs(5);

pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let expected = state.auth_token();
    let pre_authed = validate_ws_query(&query.unwrap_or_default(), expected.as_deref()).is_ok();
    ws.on_upgrade(move |socket| handle_socket(socket, state, pre_authed))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, pre_authed: bool) {
    let expected = state.auth_token();
    let mut authed = pre_authed;

    if !authed && expected.is_some() {
        authed = match tokio::time::timeout(AUTH_GRACE, socket.recv()).await {
            Ok(Some(Ok(Message::Text(text)))) => extract_token(&text)
                .map(|token| validate_ws_auth(&token, expected.as_deref()).is_ok())
                .unwrap_or(false),
            _ => false,
        };
    }

    if !authed && expected.is_some() {
        let _ = socket.close().await;
        return;
    }

    let mut subscriber = state.events.subscribe();
    while let Some(event) = subscriber.recv().await {
        let mut payload = serde_json::to_value(&event).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("timestamp".to_string(), serde_json::json!(now_millis()));
        }
        if socket.send(Message::Text(payload.to_string().into())).await.is_err() {
            break;
        }
    }
}

fn extract_token(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("token").and_then(|t| t.as_str()).map(str::to_string)
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::transport::state::AppState;
use crate::transport::ErrorResponse;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 500;

fn err(code: ErrorCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse { error: code.to_error_body(message) }))
}

/// `GET /api/v1/health` (§6). Never requires auth.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions = state.supervisor.list(&state.project_path).await.unwrap_or_default();
    Json(serde_json::json!({
        "status": "running",
        "sessionCount": sessions.len(),
    }))
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    name: String,
    role: &'static str,
}

/// `GET /api/v1/sessions` — session listing (§6).
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionSummary>>, (StatusCode, Json<ErrorResponse>)> {
    let handles = state
        .supervisor
        .list(&state.project_path)
        .await
        .map_err(|e| err(e, "failed to list sessions"))?;
    Ok(Json(
        handles
            .into_iter()
            .map(|h| SessionSummary {
                name: h.name,
                role: match h.role {
                    crate::supervisor::Role::Agent => "agent",
                    crate::supervisor::Role::Console => "console",
                },
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    session: String,
    lines: Vec<String>,
    total: usize,
}

/// `GET /api/v1/sessions/{name}/messages?limit=&offset=` — paginated
/// message listing (§6: `limit<=500, offset>=0`).
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<MessagesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = page.offset.unwrap_or(0);

    let capture = state
        .get_or_attach_capture(&name)
        .await
        .ok_or_else(|| err(ErrorCode::SessionNotFound, "no such session"))?;
    let content = capture.get_content(None).await;
    let total = content.lines.len();
    let lines = content.lines.into_iter().skip(offset).take(limit).collect();

    Ok(Json(MessagesResponse { session: name, lines, total }))
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    text: Option<String>,
    key: Option<String>,
    #[serde(default = "default_press_enter")]
    press_enter: bool,
}

fn default_press_enter() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    accepted: bool,
}

/// `POST /api/v1/sessions/{name}/commands` — inject text or a special key
/// into a session (§6 "trigger commands on a session").
pub async fn trigger_command(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
    Json(body): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, (StatusCode, Json<ErrorResponse>)> {
    let capture = state
        .get_or_attach_capture(&name)
        .await
        .ok_or_else(|| err(ErrorCode::SessionNotFound, "no such session"))?;

    let accepted = if let Some(key) = body.key {
        capture.send_key(&key).await.map_err(|e| err(e, "unknown key"))?
    } else if let Some(text) = body.text {
        capture.send_input(&text, body.press_enter).await
    } else {
        return Err(err(ErrorCode::InvalidInput, "request must carry text or key"));
    };

    Ok(Json(CommandResponse { accepted }))
}

#[derive(Debug, Deserialize)]
pub struct AutoRunRequest {
    prompt: String,
    #[serde(default = "default_duration_minutes")]
    duration_minutes: u64,
    #[serde(default)]
    command: Vec<String>,
}

fn default_duration_minutes() -> u64 {
    30
}

#[derive(Debug, Serialize)]
struct AutoRunAccepted {
    accepted: bool,
}

/// `POST /api/v1/autoruns` — trigger an autonomous run (§6 "trigger
/// autonomous runs"). Runs in the background; progress is observable via
/// the `/ws` event channel (`auto:completed` etc.).
pub async fn trigger_autorun(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AutoRunRequest>,
) -> Result<Json<AutoRunAccepted>, (StatusCode, Json<ErrorResponse>)> {
    if body.prompt.trim().is_empty() {
        return Err(err(ErrorCode::InvalidInput, "prompt must not be empty"));
    }

    let controller = state.controller.clone();
    let project_path = state.project_path.clone();
    let command =
        if body.command.is_empty() { vec!["agent-cli".to_string()] } else { body.command };
    let deadline = std::time::Duration::from_secs(body.duration_minutes * 60);

    tokio::spawn(async move {
        controller.run(&project_path, &command, &body.prompt, deadline).await;
    });

    Ok(Json(AutoRunAccepted { accepted: true }))
}

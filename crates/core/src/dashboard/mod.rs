// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard HTTP/WS façade (§6 "Dashboard façade"): session listing,
//! message listing, command/autorun triggers, health, and a WebSocket
//! event broadcaster.

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::transport::auth::auth_layer;
use crate::transport::state::AppState;

/// Build the dashboard's axum `Router`. `public` disables the auth layer
/// entirely (operator opted into `--dashboard-public`).
pub fn build_router(state: Arc<AppState>, public: bool) -> Router {
    let mut router = Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/sessions", get(handlers::list_sessions))
        .route("/api/v1/sessions/{name}/messages", get(handlers::list_messages))
        .route("/api/v1/sessions/{name}/commands", post(handlers::trigger_command))
        .route("/api/v1/autoruns", post(handlers::trigger_autorun))
        .route("/ws", get(ws::upgrade));

    if !public {
        router = router.layer(middleware::from_fn_with_state(state.clone(), auth_layer));
    }

    router.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

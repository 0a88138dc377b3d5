// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state threaded through every dashboard HTTP/WS handler via
//! `axum::extract::State<Arc<AppState>>`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use crate::capture::LiveCapture;
use crate::controller::AutonomousController;
use crate::events::{EventFanOut, EventSender};
use crate::mux::MultiplexerDriver;
use crate::supervisor::SessionSupervisor;

/// Default scrollback sized ring for dashboard-attached captures (§6): these
/// are read-only viewers, independent of whatever `LiveCapture` an
/// in-flight `AutonomousController::run` owns for the same session.
const DASHBOARD_RING_CAPACITY: usize = 4000;

/// Dashboard-specific config (§6 "Dashboard façade"): auth secret and
/// public/private binding mode. Password updates take effect on the next
/// request since `auth_token` is re-read from a lock on every call.
pub struct DashboardConfig {
    pub auth_token: Option<String>,
}

/// Process-wide state for one project the dashboard supervises.
pub struct AppState {
    pub config: StdMutex<DashboardConfig>,
    pub driver: Arc<dyn MultiplexerDriver>,
    pub supervisor: Arc<SessionSupervisor>,
    pub events: Arc<EventFanOut>,
    pub captures: StdMutex<HashMap<String, LiveCapture>>,
    pub controller: Arc<AutonomousController>,
    pub project_path: PathBuf,
    pub progress_dir: String,
}

impl AppState {
    /// Snapshot the current auth token. Re-reads the lock every call so a
    /// password rotation via [`set_auth_token`](Self::set_auth_token) takes
    /// effect immediately, without a restart.
    pub fn auth_token(&self) -> Option<String> {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).auth_token.clone()
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).auth_token = token;
    }

    pub fn capture_for(&self, session: &str) -> Option<LiveCapture> {
        self.captures.lock().unwrap_or_else(|e| e.into_inner()).get(session).cloned()
    }

    pub fn register_capture(&self, session: String, capture: LiveCapture) {
        self.captures.lock().unwrap_or_else(|e| e.into_inner()).insert(session, capture);
    }

    /// Return a cached dashboard capture for `session`, or attach a fresh
    /// one if the session exists on the host multiplexer but hasn't been
    /// viewed yet. Returns `None` if the session doesn't exist at all.
    pub async fn get_or_attach_capture(&self, session: &str) -> Option<LiveCapture> {
        if let Some(existing) = self.capture_for(session) {
            return Some(existing);
        }

        if !self.driver.exists(session).await.unwrap_or(false) {
            return None;
        }

        let events: EventSender = self.events.sender();
        let capture =
            LiveCapture::new(self.driver.clone(), events, std::env::temp_dir(), DASHBOARD_RING_CAPACITY);
        if capture.start(session.to_string()).await.is_err() {
            return None;
        }
        self.register_capture(session.to_string(), capture.clone());
        Some(capture)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C4 — SessionSupervisor (§4.1): derives project-scoped session names,
//! asserts host preconditions, starts/stops sessions, and produces a
//! best-effort progress dump before killing an agent session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::capture::LiveCapture;
use crate::error::ErrorCode;
use crate::events::{Event, EventSender};
use crate::mux::{MultiplexerDriver, SessionState as MuxSessionState};

const AGENT_PREFIX: &str = "agent";
const CONSOLE_PREFIX: &str = "console";
const START_RETRY_ATTEMPTS: u32 = 10;
const START_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const MIN_SCROLLBACK: usize = 5000;
const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_DUMP_LINES: usize = 400;

/// Which command line a session runs (§3: role distinguishes the agent
/// session proper from an operator console attached alongside it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Agent,
    Console,
}

impl Role {
    fn prefix(self) -> &'static str {
        match self {
            Role::Agent => AGENT_PREFIX,
            Role::Console => CONSOLE_PREFIX,
        }
    }
}

/// Handle-local lifecycle state (§4.1 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Absent,
    Starting,
    Running,
    Stopping,
}

/// A supervised session (§3 `SessionHandle`).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub name: String,
    pub role: Role,
    pub project_path: PathBuf,
    pub state: HandleState,
}

/// Aggregate result of [`SessionSupervisor::stop_all`].
#[derive(Debug, Clone, Default)]
pub struct StopAllReport {
    pub succeeded: usize,
    pub failed: usize,
    pub saved: usize,
}

/// Derives session names, starts/stops sessions on the host multiplexer,
/// and writes progress dumps (§4.1). Exclusively owns the [`SessionHandle`]s
/// it creates for the lifetime of a supervision span.
pub struct SessionSupervisor {
    driver: Arc<dyn MultiplexerDriver>,
    events: EventSender,
}

impl SessionSupervisor {
    pub fn new(driver: Arc<dyn MultiplexerDriver>, events: EventSender) -> Self {
        Self { driver, events }
    }

    /// `ensureTooling()`: fails with `ToolingMissing` if the multiplexer
    /// binary is not on `PATH`.
    pub async fn ensure_tooling(&self) -> Result<(), ErrorCode> {
        self.driver.ensure_tooling().await
    }

    /// Enumerate sessions belonging to `project_path`, in host-reported
    /// (insertion) order.
    pub async fn list(&self, project_path: &Path) -> Result<Vec<SessionHandle>, ErrorCode> {
        let agent_name = session_name(project_path, Role::Agent);
        let console_name = session_name(project_path, Role::Console);
        let records = self.driver.list().await?;
        Ok(records
            .into_iter()
            .filter_map(|r| {
                let role = if r.name == agent_name {
                    Role::Agent
                } else if r.name == console_name {
                    Role::Console
                } else {
                    return None;
                };
                let state = match r.state {
                    MuxSessionState::Attached | MuxSessionState::Detached => HandleState::Running,
                };
                Some(SessionHandle { name: r.name, role, project_path: project_path.to_path_buf(), state })
            })
            .collect())
    }

    /// Start a session for `project_path` with the given `role`, running
    /// `command`. Fails if a session with the computed name already exists.
    pub async fn start(
        &self,
        project_path: &Path,
        role: Role,
        command: &[String],
    ) -> Result<SessionHandle, ErrorCode> {
        self.ensure_tooling().await?;
        let name = session_name(project_path, role);

        if self.driver.exists(&name).await? {
            return Err(ErrorCode::SessionStartTimeout);
        }

        if let Err(e) = self.driver.spawn(&name, command, MIN_SCROLLBACK).await {
            let _ = self.driver.kill(&name).await;
            return Err(e);
        }

        for _ in 0..START_RETRY_ATTEMPTS {
            if self.driver.exists(&name).await.unwrap_or(false) {
                self.events.emit(Event::SupervisorSessionStarted { session: name.clone() });
                return Ok(SessionHandle {
                    name,
                    role,
                    project_path: project_path.to_path_buf(),
                    state: HandleState::Running,
                });
            }
            tokio::time::sleep(START_RETRY_INTERVAL).await;
        }

        let _ = self.driver.kill(&name).await;
        Err(ErrorCode::SessionStartTimeout)
    }

    /// Stop `handle`. If `save_progress` and `handle.role == Agent`, attempt
    /// a best-effort progress dump before killing the session regardless of
    /// dump success.
    pub async fn stop(
        &self,
        handle: &SessionHandle,
        progress_dir: &str,
        save_progress: bool,
        reason: &str,
    ) -> Option<PathBuf> {
        let dump = if save_progress && handle.role == Role::Agent {
            match self.save_progress(handle, progress_dir, reason).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(session = %handle.name, error = %e, "progress dump failed");
                    None
                }
            }
        } else {
            None
        };

        let _ = self.driver.kill(&handle.name).await;
        self.events.emit(Event::SupervisorSessionStopped { session: handle.name.clone() });
        dump
    }

    /// Stop every session belonging to `project_path`. At-most-once kill
    /// per handle.
    pub async fn stop_all(
        &self,
        project_path: &Path,
        progress_dir: &str,
        save_progress: bool,
        reason: &str,
    ) -> StopAllReport {
        let mut report = StopAllReport::default();
        let handles = match self.list(project_path).await {
            Ok(h) => h,
            Err(_) => return report,
        };
        for handle in handles {
            let dump = self.stop(&handle, progress_dir, save_progress, reason).await;
            report.succeeded += 1;
            if dump.is_some() {
                report.saved += 1;
            }
        }
        report
    }

    /// Inject a short structured summary request, wait `DEFAULT_SAVE_INTERVAL`,
    /// capture the last `DEFAULT_DUMP_LINES` lines, and write the
    /// header-framed progress dump file (§6).
    async fn save_progress(
        &self,
        handle: &SessionHandle,
        progress_dir: &str,
        reason: &str,
    ) -> Result<PathBuf, ErrorCode> {
        let prompt = "\n\nBefore you stop: briefly summarize your current progress and any remaining steps.\n";
        let _ = self.driver.stuff(&handle.name, prompt.as_bytes()).await;
        tokio::time::sleep(DEFAULT_SAVE_INTERVAL).await;

        let tmpfs_dir = std::env::temp_dir();
        let capture = LiveCapture::new(self.driver.clone(), self.events.clone(), tmpfs_dir, DEFAULT_DUMP_LINES * 4);
        capture.start(handle.name.clone()).await.ok();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let content = capture.get_content(Some(DEFAULT_DUMP_LINES)).await;
        capture.destroy();

        let dir = handle.project_path.join(progress_dir);
        tokio::fs::create_dir_all(&dir).await.map_err(|_| ErrorCode::PermissionDeniedByHost)?;

        let safe_name = safe_file_component(&handle.name);
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let path = dir.join(format!("{safe_name}-{timestamp}-{reason}.txt"));

        let mut body = String::new();
        body.push_str(&format!("# project: {}\n", handle.project_path.display()));
        body.push_str(&format!("# session: {}\n", handle.name));
        body.push_str(&format!("# saved: {}\n", chrono::Utc::now().to_rfc3339()));
        body.push_str(&format!("# reason: {reason}\n"));
        body.push('\n');
        for line in &content.lines {
            body.push_str(line);
            body.push('\n');
        }

        tokio::fs::write(&path, body).await.map_err(|_| ErrorCode::PermissionDeniedByHost)?;
        Ok(path)
    }
}

/// Derive the deterministic per-project session name (§4.1, normative rule).
pub fn session_name(project_path: &Path, role: Role) -> String {
    let basename = project_path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let stripped: String = basename.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let slug = if stripped.is_empty() {
        "project".to_string()
    } else {
        stripped.chars().take(12).collect::<String>().to_lowercase()
    };

    let normalized = normalize_path(project_path);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let hash = digest.iter().take(4).map(|b| format!("{b:02x}")).collect::<String>();

    format!("{}-{}-{}", role.prefix(), slug, hash)
}

/// Canonicalize for hashing purposes only (do not touch the filesystem):
/// lowercase, trim a trailing separator.
fn normalize_path(project_path: &Path) -> String {
    let s = project_path.to_string_lossy();
    s.trim_end_matches('/').to_lowercase()
}

fn safe_file_component(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

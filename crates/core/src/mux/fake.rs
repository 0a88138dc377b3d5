// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`MultiplexerDriver`] for tests, per the §9 design note that
//! multiplexer interactions should be testable without spawning real
//! processes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{DriverFuture, MultiplexerDriver, SessionRecord, SessionState};
use crate::error::ErrorCode;

#[derive(Debug, Clone)]
struct FakeSession {
    pid: u32,
    date: String,
    state: SessionState,
    /// Accumulated bytes injected via `stuff`, simulating a live screen.
    screen: Vec<u8>,
    log_on: bool,
}

/// Fake multiplexer: sessions live in a `HashMap` guarded by a `Mutex`.
/// `stuff` appends to an in-memory "screen"; `snapshot`/`log_toggle` write
/// that screen to the requested path so capture-path tests can exercise
/// real file I/O without a real tmux.
#[derive(Debug, Default)]
pub struct FakeDriver {
    sessions: Mutex<HashMap<String, FakeSession>>,
    tooling_present: bool,
    next_pid: Mutex<u32>,
    attach_argv: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            tooling_present: true,
            next_pid: Mutex::new(1000),
            attach_argv: Mutex::new(vec!["/bin/cat".to_string()]),
        }
    }

    /// Construct a driver that reports the multiplexer binary as missing.
    pub fn without_tooling() -> Self {
        Self { tooling_present: false, ..Self::new() }
    }

    /// Override the argv returned by `attach_argv`, so capture tests can
    /// force a PTY-attach success (e.g. `/bin/cat`) or immediate-exit
    /// failure (e.g. `/bin/false`) without any real multiplexer.
    pub fn set_attach_argv(&self, argv: Vec<String>) {
        *self.attach_argv.lock().unwrap_or_else(|e| e.into_inner()) = argv;
    }

    /// Pre-seed a session as if it had been spawned out of band.
    pub fn seed_session(&self, name: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut next_pid = self.next_pid.lock().unwrap_or_else(|e| e.into_inner());
        *next_pid += 1;
        sessions.insert(
            name.to_string(),
            FakeSession {
                pid: *next_pid,
                date: "0".to_string(),
                state: SessionState::Detached,
                screen: Vec::new(),
                log_on: false,
            },
        );
    }

    /// Remove a session out of band, simulating the host killing it.
    pub fn kill_externally(&self, name: &str) {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).remove(name);
    }

    /// Append bytes to a session's in-memory screen, simulating agent output.
    pub fn push_output(&self, name: &str, data: &[u8]) {
        if let Some(s) = self.sessions.lock().unwrap_or_else(|e| e.into_inner()).get_mut(name) {
            s.screen.extend_from_slice(data);
        }
    }

    pub fn screen_contents(&self, name: &str) -> Vec<u8> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|s| s.screen.clone())
            .unwrap_or_default()
    }

    fn write_screen_to(path: PathBuf, data: Vec<u8>) -> Result<(), ErrorCode> {
        std::fs::write(path, data).map_err(|_| ErrorCode::PermissionDeniedByHost)
    }
}

impl MultiplexerDriver for FakeDriver {
    fn ensure_tooling(&self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            if self.tooling_present {
                Ok(())
            } else {
                Err(ErrorCode::ToolingMissing)
            }
        })
    }

    fn list(&self) -> DriverFuture<'_, Vec<SessionRecord>> {
        Box::pin(async move {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            Ok(sessions
                .iter()
                .map(|(name, s)| SessionRecord {
                    name: name.clone(),
                    pid: Some(s.pid),
                    date: s.date.clone(),
                    state: s.state,
                })
                .collect())
        })
    }

    fn exists<'a>(&'a self, name: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            Ok(self.sessions.lock().unwrap_or_else(|e| e.into_inner()).contains_key(name))
        })
    }

    fn spawn<'a>(
        &'a self,
        name: &'a str,
        command: &'a [String],
        _scrollback_lines: usize,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            if !self.tooling_present {
                return Err(ErrorCode::ToolingMissing);
            }
            if command.is_empty() {
                return Err(ErrorCode::InvalidInput);
            }
            self.seed_session(name);
            Ok(())
        })
    }

    fn kill<'a>(&'a self, name: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            self.sessions.lock().unwrap_or_else(|e| e.into_inner()).remove(name);
            Ok(())
        })
    }

    fn stuff<'a>(&'a self, name: &'a str, bytes: &'a [u8]) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            match sessions.get_mut(name) {
                Some(s) => {
                    s.screen.extend_from_slice(bytes);
                    Ok(())
                }
                None => Err(ErrorCode::SessionNotFound),
            }
        })
    }

    fn snapshot<'a>(&'a self, name: &'a str, path: &'a Path) -> DriverFuture<'a, ()> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let screen = {
                let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
                sessions.get(name).ok_or(ErrorCode::SessionNotFound)?.screen.clone()
            };
            Self::write_screen_to(path, screen)
        })
    }

    fn log_toggle<'a>(&'a self, name: &'a str, on: bool, path: &'a Path) -> DriverFuture<'a, ()> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let screen = {
                let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
                let s = sessions.get_mut(name).ok_or(ErrorCode::SessionNotFound)?;
                s.log_on = on;
                s.screen.clone()
            };
            if on {
                Self::write_screen_to(path, screen)
            } else {
                Ok(())
            }
        })
    }

    fn resize<'a>(&'a self, name: &'a str, _cols: u16, _rows: u16) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            if self.sessions.lock().unwrap_or_else(|e| e.into_inner()).contains_key(name) {
                Ok(())
            } else {
                Err(ErrorCode::SessionNotFound)
            }
        })
    }

    fn attach_argv(&self, _name: &str) -> Vec<String> {
        self.attach_argv.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

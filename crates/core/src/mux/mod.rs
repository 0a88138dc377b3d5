// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow contract over the host terminal multiplexer (§6), so the rest of
//! the core is testable against [`FakeDriver`] without spawning real
//! processes.

pub mod escape;
pub mod fake;
pub mod keys;
pub mod tmux;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::error::ErrorCode;

/// Boxed future type returned by every [`MultiplexerDriver`] method, so the
/// trait stays object-safe for use as `Arc<dyn MultiplexerDriver>`.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ErrorCode>> + Send + 'a>>;

/// A session's attach state as reported by the host multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Attached,
    Detached,
}

/// One row of the host multiplexer's session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub name: String,
    pub pid: Option<u32>,
    /// Opaque creation timestamp as reported by the host (§3: "date").
    pub date: String,
    pub state: SessionState,
}

/// Narrow contract over the host multiplexer: list / exists / spawn / kill /
/// stuff / snapshot / log, per the §9 design note. Every call is expected to
/// carry its own bounded timeout (§5).
pub trait MultiplexerDriver: Send + Sync {
    /// Whether the multiplexer binary is present and executable.
    fn ensure_tooling(&self) -> DriverFuture<'_, ()>;

    /// List all sessions known to the host multiplexer.
    fn list(&self) -> DriverFuture<'_, Vec<SessionRecord>>;

    /// Whether a session with this exact name exists.
    fn exists<'a>(&'a self, name: &'a str) -> DriverFuture<'a, bool>;

    /// Spawn a new detached session named `name` running `command`, with
    /// scrollback sized to at least `scrollback_lines`.
    fn spawn<'a>(
        &'a self,
        name: &'a str,
        command: &'a [String],
        scrollback_lines: usize,
    ) -> DriverFuture<'a, ()>;

    /// Kill the session by name. Idempotent: killing an absent session is
    /// not an error.
    fn kill<'a>(&'a self, name: &'a str) -> DriverFuture<'a, ()>;

    /// Inject a literal byte sequence into the session's input.
    fn stuff<'a>(&'a self, name: &'a str, bytes: &'a [u8]) -> DriverFuture<'a, ()>;

    /// Snapshot the current screen plus scrollback to `path` (hardcopy).
    fn snapshot<'a>(&'a self, name: &'a str, path: &'a Path) -> DriverFuture<'a, ()>;

    /// Toggle session logging to `path` on or off.
    fn log_toggle<'a>(&'a self, name: &'a str, on: bool, path: &'a Path) -> DriverFuture<'a, ()>;

    /// Resize the session's window/pane (used before a PTY attach so the
    /// wide-terminal contract in §4.2 holds).
    fn resize<'a>(&'a self, name: &'a str, cols: u16, rows: u16) -> DriverFuture<'a, ()>;

    /// The argv to `exec` for a read-only PTY attach to `name` (§4.2 item 1).
    /// Synchronous: this only builds a command line, it does not run it.
    fn attach_argv(&self, name: &str) -> Vec<String>;
}

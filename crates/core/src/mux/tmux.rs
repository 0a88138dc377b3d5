// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tmux`-backed [`MultiplexerDriver`].
//!
//! Every call is a short-lived `tokio::process::Command` invocation under a
//! bounded timeout (§5), in the same style the teacher uses for its own
//! `tmux` compatibility backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{DriverFuture, MultiplexerDriver, SessionRecord, SessionState};
use crate::error::ErrorCode;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives a real `tmux` binary, optionally against an isolated server socket
/// (`-S <path>`) so a supervising process never collides with the operator's
/// own tmux session.
#[derive(Debug, Clone)]
pub struct TmuxDriver {
    socket: Option<PathBuf>,
}

impl TmuxDriver {
    pub fn new() -> Self {
        Self { socket: None }
    }

    /// Target an isolated tmux server socket instead of the default one.
    pub fn with_socket(socket: PathBuf) -> Self {
        Self { socket: Some(socket) }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(ref s) = self.socket {
            cmd.arg("-S").arg(s);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, ErrorCode> {
        let mut cmd = self.command();
        cmd.args(args);
        match tokio::time::timeout(CALL_TIMEOUT, cmd.output()).await {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ErrorCode::ToolingMissing)
            }
            Ok(Err(_)) => Err(ErrorCode::TransportError),
            Err(_) => Err(ErrorCode::TransportError),
        }
    }
}

impl Default for TmuxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplexerDriver for TmuxDriver {
    fn ensure_tooling(&self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            match self.run(&["-V"]).await {
                Ok(_) => Ok(()),
                Err(ErrorCode::ToolingMissing) => Err(ErrorCode::ToolingMissing),
                Err(_) => Err(ErrorCode::ToolingMissing),
            }
        })
    }

    fn list(&self) -> DriverFuture<'_, Vec<SessionRecord>> {
        Box::pin(async move {
            let format = "#{session_name}\t#{session_created}\t#{session_attached}";
            let out = self.run(&["list-sessions", "-F", format]).await;
            match out {
                Ok(out) if out.status.success() => {
                    let text = String::from_utf8_lossy(&out.stdout);
                    Ok(text.lines().filter_map(parse_session_line).collect())
                }
                // `tmux list-sessions` exits non-zero with "no server running"
                // when there are no sessions at all; treat as an empty list.
                Ok(_) => Ok(Vec::new()),
                Err(e) => Err(e),
            }
        })
    }

    fn exists<'a>(&'a self, name: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            let out = self.run(&["has-session", "-t", name]).await?;
            Ok(out.status.success())
        })
    }

    fn spawn<'a>(
        &'a self,
        name: &'a str,
        command: &'a [String],
        scrollback_lines: usize,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            if command.is_empty() {
                return Err(ErrorCode::InvalidInput);
            }
            let joined = command.join(" ");
            let out = self.run(&["new-session", "-d", "-s", name, &joined]).await?;
            if !out.status.success() {
                return Err(ErrorCode::SessionStartTimeout);
            }
            let scrollback = scrollback_lines.max(5000).to_string();
            let _ = self.run(&["set-option", "-t", name, "history-limit", &scrollback]).await;
            Ok(())
        })
    }

    fn kill<'a>(&'a self, name: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            // Killing an absent session is not an error (§4.1 at-most-once).
            let _ = self.run(&["kill-session", "-t", name]).await;
            Ok(())
        })
    }

    fn stuff<'a>(&'a self, name: &'a str, bytes: &'a [u8]) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            // `send-keys -l` takes its argument literally when invoked
            // directly (no shell in between), so a `$'...'` literal would
            // be typed verbatim into the pane instead of being expanded.
            // Route through `sh -c` so the host's own $'...'-style control
            // byte escaping (§6) is actually interpreted, matching the
            // contract that arbitrary control bytes (sendKey) survive
            // byte-for-byte.
            let line = stuff_command_line(self.socket.as_deref(), name, bytes);

            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&line).stdout(Stdio::piped()).stderr(Stdio::null());
            let out = match tokio::time::timeout(CALL_TIMEOUT, cmd.output()).await {
                Ok(Ok(out)) => out,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ErrorCode::ToolingMissing)
                }
                Ok(Err(_)) => return Err(ErrorCode::TransportError),
                Err(_) => return Err(ErrorCode::TransportError),
            };
            if !out.status.success() {
                return Err(ErrorCode::TransportError);
            }
            Ok(())
        })
    }

    fn snapshot<'a>(&'a self, name: &'a str, path: &'a Path) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            let out = self.run(&["capture-pane", "-t", name, "-p", "-e", "-S", "-"]).await?;
            if !out.status.success() {
                return Err(ErrorCode::CaptureMethodFailed);
            }
            tokio::fs::write(path.to_path_buf(), out.stdout)
                .await
                .map_err(|_| ErrorCode::PermissionDeniedByHost)?;
            Ok(())
        })
    }

    fn log_toggle<'a>(&'a self, name: &'a str, on: bool, path: &'a Path) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            let out = if on {
                let path_str = path.to_string_lossy().into_owned();
                let shell_cmd = format!("cat >> {}", super::escape::shell_quote(&path_str));
                self.run(&["pipe-pane", "-t", name, "-O", &shell_cmd]).await?
            } else {
                self.run(&["pipe-pane", "-t", name]).await?
            };
            if !out.status.success() {
                return Err(ErrorCode::CaptureMethodFailed);
            }
            Ok(())
        })
    }

    fn resize<'a>(&'a self, name: &'a str, cols: u16, rows: u16) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            let cols = cols.to_string();
            let rows = rows.to_string();
            let out = self
                .run(&["resize-window", "-t", name, "-x", &cols, "-y", &rows])
                .await?;
            if !out.status.success() {
                return Err(ErrorCode::TransportError);
            }
            Ok(())
        })
    }

    fn attach_argv(&self, name: &str) -> Vec<String> {
        let mut argv = vec!["tmux".to_string()];
        if let Some(ref s) = self.socket {
            argv.push("-S".to_string());
            argv.push(s.to_string_lossy().into_owned());
        }
        argv.extend(["attach-session".to_string(), "-r".to_string(), "-t".to_string(), name.to_string()]);
        argv
    }
}

/// Build the `sh -c` command line for a `stuff` call, shell-quoting the
/// socket path and session name and dollar-quoting the payload bytes so
/// control bytes delivered via `sendKey` survive intact (§6, §9).
fn stuff_command_line(socket: Option<&Path>, name: &str, bytes: &[u8]) -> String {
    let literal = super::escape::dollar_quote_bytes(bytes);
    let mut line = String::from("tmux");
    if let Some(s) = socket {
        line.push_str(" -S ");
        line.push_str(&super::escape::shell_quote(&s.to_string_lossy()));
    }
    line.push_str(" send-keys -t ");
    line.push_str(&super::escape::shell_quote(name));
    line.push_str(" -l ");
    line.push_str(&literal);
    line
}

fn parse_session_line(line: &str) -> Option<SessionRecord> {
    let mut parts = line.splitn(3, '\t');
    let name = parts.next()?.to_string();
    let date = parts.next()?.to_string();
    let attached = parts.next()?;
    let state = if attached.trim() == "1" { SessionState::Attached } else { SessionState::Detached };
    Some(SessionRecord { name, pid: None, date, state })
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Autonomous orchestration runner for an external interactive CLI agent.
///
/// Supervises a detached multiplexer session, drives the agent toward
/// completion of `prompt` within `duration`, and exits 0 iff it completed.
#[derive(Debug, Parser)]
#[command(name = "warden", version, about)]
pub struct Config {
    /// Absolute path to the project the agent will work in.
    #[arg(env = "WARDEN_PROJECT_PATH")]
    pub project_path: PathBuf,

    /// The task prompt sent to the agent.
    #[arg(env = "WARDEN_PROMPT")]
    pub prompt: String,

    /// Time budget as `H:MM` (hours:minutes).
    #[arg(default_value = "0:30", env = "WARDEN_DURATION")]
    pub duration: String,

    /// Override the RPC socket path (default: `<project>/.warden/warden.sock`).
    #[arg(long, env = "WARDEN_RPC_SOCKET")]
    pub rpc_socket: Option<PathBuf>,

    /// Shared secret the dashboard compares against in constant time.
    #[arg(long, env = "WARDEN_DASHBOARD_PASSWORD")]
    pub dashboard_password: Option<String>,

    /// Bind the dashboard to all interfaces without a password.
    #[arg(long, env = "WARDEN_DASHBOARD_PUBLIC", default_value_t = false)]
    pub dashboard_public: bool,

    /// Dashboard HTTP/WS port (omit to disable the dashboard façade).
    #[arg(long, env = "WARDEN_DASHBOARD_PORT")]
    pub dashboard_port: Option<u16>,

    /// Health-check-only HTTP port.
    #[arg(long, env = "WARDEN_HEALTH_PORT")]
    pub health_port: Option<u16>,

    /// Directory name (relative to project) for progress dumps.
    #[arg(long, env = "WARDEN_PROGRESS_DIR", default_value = "progress")]
    pub progress_dir: String,

    /// Named tmux server socket, for running isolated from the user's tmux.
    #[arg(long, env = "WARDEN_TMUX_SOCKET")]
    pub tmux_socket: Option<String>,

    /// Program name (and arguments) used to launch the agent in the
    /// supervised session, e.g. `claude` or `claude --dangerously-skip-permissions`.
    #[arg(long, env = "WARDEN_AGENT_COMMAND", default_value = "claude")]
    pub agent_command: String,

    /// Path to a file containing the dashboard password. When set, the
    /// file is watched and a change hot-reloads the in-memory auth token
    /// without a restart.
    #[arg(long, env = "WARDEN_DASHBOARD_PASSWORD_FILE")]
    pub dashboard_password_file: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.project_path.is_absolute() {
            anyhow::bail!("project-path must be an absolute path");
        }

        parse_duration(&self.duration)?;

        if self.dashboard_port.is_some()
            && self.dashboard_password.is_none()
            && !self.dashboard_public
        {
            anyhow::bail!(
                "--dashboard-port requires --dashboard-password, or --dashboard-public to opt out"
            );
        }

        Ok(())
    }

    /// The RPC socket path, honoring the override.
    pub fn rpc_socket_path(&self) -> PathBuf {
        self.rpc_socket
            .clone()
            .unwrap_or_else(|| self.project_path.join(".warden").join("warden.sock"))
    }

    /// The time budget parsed into a [`Duration`].
    pub fn duration(&self) -> Duration {
        // Validated in `validate()`; defensive fallback keeps this infallible.
        parse_duration(&self.duration).unwrap_or(Duration::from_secs(30 * 60))
    }

    /// The agent command split into an argv, per shell whitespace rules.
    pub fn agent_command_argv(&self) -> Vec<String> {
        self.agent_command.split_whitespace().map(str::to_string).collect()
    }
}

/// Parse an `H:MM` duration string into a [`Duration`].
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let (hours, minutes) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("duration must be in H:MM format, got {s:?}"))?;
    let hours: u64 = hours.parse().map_err(|_| anyhow::anyhow!("invalid hours in {s:?}"))?;
    let minutes: u64 = minutes.parse().map_err(|_| anyhow::anyhow!("invalid minutes in {s:?}"))?;
    if minutes >= 60 {
        anyhow::bail!("minutes must be < 60, got {minutes} in {s:?}");
    }
    Ok(Duration::from_secs(hours * 3600 + minutes * 60))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

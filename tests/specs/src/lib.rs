// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box end-to-end harness: spawns the real `warden` binary against an
//! isolated tmux server socket and a scratch project directory, and
//! exercises it over the dashboard HTTP/WS façade.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `warden` binary.
pub fn warden_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("warden")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Write an executable shell script standing in for the interactive agent,
/// returning its path. Kept to a single path with no arguments so it
/// survives `Config::agent_command_argv`'s whitespace split.
pub fn write_fake_agent(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("fake-agent.sh");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "#!/bin/sh\n{body}")?;
    let mut perms = file.metadata()?.permissions();
    perms.set_mode(0o755);
    file.set_permissions(perms)?;
    Ok(path)
}

/// Builder for one `warden` subprocess invocation.
pub struct WardenBuilder {
    project_path: PathBuf,
    prompt: String,
    duration: String,
    agent_command: Option<String>,
    dashboard_port: Option<u16>,
    dashboard_public: bool,
    dashboard_password: Option<String>,
    health_port: Option<u16>,
    _project_dir: tempfile::TempDir,
    _tmux_dir: tempfile::TempDir,
}

impl WardenBuilder {
    pub fn new(prompt: &str) -> anyhow::Result<Self> {
        let project_dir = tempfile::tempdir()?;
        let tmux_dir = tempfile::tempdir()?;
        Ok(Self {
            project_path: project_dir.path().to_path_buf(),
            prompt: prompt.to_string(),
            duration: "0:30".to_string(),
            agent_command: None,
            dashboard_port: None,
            dashboard_public: false,
            dashboard_password: None,
            health_port: None,
            _project_dir: project_dir,
            _tmux_dir: tmux_dir,
        })
    }

    pub fn duration(mut self, d: &str) -> Self {
        self.duration = d.to_string();
        self
    }

    pub fn agent_command(mut self, cmd: &Path) -> Self {
        self.agent_command = Some(cmd.to_string_lossy().into_owned());
        self
    }

    pub fn with_dashboard(mut self) -> anyhow::Result<Self> {
        self.dashboard_port = Some(free_port()?);
        self.dashboard_public = true;
        Ok(self)
    }

    pub fn with_dashboard_password(mut self, password: &str) -> anyhow::Result<Self> {
        self.dashboard_port = Some(free_port()?);
        self.dashboard_password = Some(password.to_string());
        Ok(self)
    }

    pub fn with_health(mut self) -> anyhow::Result<Self> {
        self.health_port = Some(free_port()?);
        Ok(self)
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn tmux_socket(&self) -> PathBuf {
        self._tmux_dir.path().join("tmux.sock")
    }

    pub fn spawn(self) -> anyhow::Result<WardenProcess> {
        let binary = warden_binary();
        anyhow::ensure!(binary.exists(), "warden binary not found at {}", binary.display());

        let mut args: Vec<String> = vec![
            self.project_path.to_string_lossy().into_owned(),
            self.prompt.clone(),
            self.duration.clone(),
            "--tmux-socket".into(),
            self.tmux_socket().to_string_lossy().into_owned(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];

        if let Some(cmd) = &self.agent_command {
            args.extend(["--agent-command".into(), cmd.clone()]);
        }
        if let Some(port) = self.dashboard_port {
            args.extend(["--dashboard-port".into(), port.to_string()]);
        }
        if self.dashboard_public {
            args.push("--dashboard-public".into());
        }
        if let Some(password) = &self.dashboard_password {
            args.extend(["--dashboard-password".into(), password.clone()]);
        }
        if let Some(port) = self.health_port {
            args.extend(["--health-port".into(), port.to_string()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(WardenProcess {
            child,
            dashboard_port: self.dashboard_port,
            health_port: self.health_port,
            project_path: self.project_path,
            _project_dir: self._project_dir,
            _tmux_dir: self._tmux_dir,
        })
    }
}

/// A running `warden` process, killed on drop.
pub struct WardenProcess {
    child: Child,
    dashboard_port: Option<u16>,
    health_port: Option<u16>,
    project_path: PathBuf,
    _project_dir: tempfile::TempDir,
    _tmux_dir: tempfile::TempDir,
}

impl WardenProcess {
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.dashboard_port.unwrap_or(0))
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.dashboard_port.unwrap_or(0))
    }

    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.health_port.unwrap_or(0))
    }

    /// Poll the dashboard health endpoint until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("warden dashboard did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("warden did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl Drop for WardenProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

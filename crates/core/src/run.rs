// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration entrypoint: wires the host multiplexer driver, the event
//! fanout, the supervisor, the autonomous controller, the optional RPC
//! bridge, and the optional dashboard façade together, then drives exactly
//! one `AutoRun` to completion (§6 "Process model").

use std::sync::{Arc, Mutex as StdMutex};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::controller::{AutonomousController, AutoRunReport, ControllerConfig};
use crate::events::EventFanOut;
use crate::mux::tmux::TmuxDriver;
use crate::mux::MultiplexerDriver;
use crate::rpc::RpcBridge;
use crate::supervisor::SessionSupervisor;
use crate::transport::state::{AppState, DashboardConfig};

/// Initialize `tracing` per the configured format/level (§6 "Logging").
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

/// Run the full process: optionally start the dashboard façade and the RPC
/// bridge, then drive one `AutoRun` and return its report. The caller maps
/// `report.exit_reason` to a process exit code.
pub async fn run(config: Config) -> anyhow::Result<AutoRunReport> {
    let driver: Arc<dyn MultiplexerDriver> = match &config.tmux_socket {
        Some(socket) => Arc::new(TmuxDriver::with_socket(std::path::PathBuf::from(socket))),
        None => Arc::new(TmuxDriver::new()),
    };

    let events = Arc::new(EventFanOut::default());
    let supervisor = Arc::new(SessionSupervisor::new(driver.clone(), events.sender()));
    let controller = Arc::new(AutonomousController::new(
        driver.clone(),
        events.sender(),
        ControllerConfig::default(),
    )?);

    let rpc_socket = config.rpc_socket_path();
    let rpc_bridge = RpcBridge::new(rpc_socket.clone(), events.sender());
    match rpc_bridge.connect().await {
        Ok(()) => info!(socket = %rpc_socket.display(), "rpc bridge connected"),
        Err(e) => warn!(socket = %rpc_socket.display(), error = %e, "rpc bridge connect failed, continuing without it"),
    }

    let dashboard_handle = if let Some(port) = config.dashboard_port {
        Some(spawn_dashboard(&config, driver.clone(), supervisor.clone(), events.clone(), controller.clone(), port).await?)
    } else {
        None
    };

    if let Some(port) = config.health_port {
        spawn_health_server(supervisor.clone(), config.project_path.clone(), port).await?;
    }

    let command = config.agent_command_argv();
    let report = controller
        .run(&config.project_path, &command, &config.prompt, config.duration())
        .await;

    rpc_bridge.disconnect().await;
    drop(dashboard_handle);

    Ok(report)
}

async fn spawn_dashboard(
    config: &Config,
    driver: Arc<dyn MultiplexerDriver>,
    supervisor: Arc<SessionSupervisor>,
    events: Arc<EventFanOut>,
    controller: Arc<AutonomousController>,
    port: u16,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let auth_token = config.dashboard_password.clone();
    let state = Arc::new(AppState {
        config: StdMutex::new(DashboardConfig { auth_token }),
        driver,
        supervisor,
        events,
        captures: StdMutex::new(std::collections::HashMap::new()),
        controller,
        project_path: config.project_path.clone(),
        progress_dir: config.progress_dir.clone(),
    });

    if let Some(path) = &config.dashboard_password_file {
        seed_and_watch_password_file(path.clone(), state.clone());
    }

    let host = if config.dashboard_public { "0.0.0.0" } else { "127.0.0.1" };
    let router = crate::dashboard::build_router(state.clone(), config.dashboard_public);

    let tcp_listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(%host, port, "dashboard listening (tcp)");
    let tcp_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp_listener, router).await {
            warn!(error = %e, "dashboard tcp server exited");
        }
    });

    let uds_path = config.project_path.join(".warden").join("dashboard.sock");
    if let Some(parent) = uds_path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    let _ = std::fs::remove_file(&uds_path);
    let uds_router = crate::dashboard::build_router(state, config.dashboard_public);
    let uds_listener = tokio::net::UnixListener::bind(&uds_path)?;
    info!(socket = %uds_path.display(), "dashboard listening (uds)");
    tokio::spawn(async move {
        let mut make_service = uds_router.into_make_service();
        loop {
            let (stream, _) = match uds_listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "dashboard uds accept failed");
                    continue;
                }
            };
            let svc_future = <_ as tower::Service<_>>::call(&mut make_service, ());
            tokio::spawn(async move {
                let svc = match svc_future.await {
                    Ok(svc) => svc,
                    Err(e) => match e {},
                };
                let io = hyper_util::rt::TokioIo::new(stream);
                let hyper_svc = hyper_util::service::TowerToHyperService::new(svc);
                let _ = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                    .serve_connection_with_upgrades(io, hyper_svc)
                    .await;
            });
        }
    });

    Ok(tcp_task)
}

/// A health-only HTTP server bound on a separate port, with no auth layer
/// (§6 "health-check-only port"): used by process supervisors that should
/// never need the dashboard password.
async fn spawn_health_server(
    supervisor: Arc<SessionSupervisor>,
    project_path: std::path::PathBuf,
    port: u16,
) -> anyhow::Result<()> {
    let router = axum::Router::new()
        .route("/api/v1/health", axum::routing::get(move || {
            let supervisor = supervisor.clone();
            let project_path = project_path.clone();
            async move {
                let sessions = supervisor.list(&project_path).await.unwrap_or_default();
                axum::Json(serde_json::json!({"status": "running", "sessionCount": sessions.len()}))
            }
        }));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "health-only server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!(error = %e, "health server exited");
        }
    });
    Ok(())
}

/// Seed the in-memory auth token from `path` and spawn a blocking watcher
/// thread that hot-reloads it on change, via `notify` (§6 "password
/// hot-reload").
fn seed_and_watch_password_file(path: std::path::PathBuf, state: Arc<AppState>) {
    if let Ok(contents) = std::fs::read_to_string(&path) {
        state.set_auth_token(Some(contents.trim().to_string()));
    }

    std::thread::spawn(move || {
        use notify::{RecursiveMode, Watcher};

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "password watcher init failed");
                return;
            }
        };
        if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
            warn!(error = %e, "password watcher watch failed");
            return;
        }

        for res in rx {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "password watcher event error");
                    continue;
                }
            };
            if matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Create(_)) {
                if let Ok(contents) = std::fs::read_to_string(&path) {
                    state.set_auth_token(Some(contents.trim().to_string()));
                    info!("dashboard password reloaded");
                }
            }
        }
    });
}

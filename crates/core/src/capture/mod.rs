// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C3 — LiveCapture (§4.2): an ANSI-preserving view of a multiplexer
//! session's screen, with a pty → snapshot → log-toggle fallback chain, a
//! session-liveness monitor, and shell-safe input/key injection.

mod filter;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ErrorCode;
use crate::events::{Event, EventSender};
use crate::mux::{keys, MultiplexerDriver};
use crate::pty::PtyAttach;
use crate::ring::RingBuffer;

/// Width/height of the forked PTY attach, per §4.2 item 1 ("wide PTY, cols
/// ≥ 220, rows ≥ 60").
pub const PTY_COLS: u16 = 220;
pub const PTY_ROWS: u16 = 60;

const DEFAULT_SNAPSHOT_POLL: Duration = Duration::from_secs(1);
const LIVENESS_POLL: Duration = Duration::from_secs(5);
const LOG_TOGGLE_WINDOW: Duration = Duration::from_millis(100);

/// Which of the three methods (§4.2) is currently populating the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMethod {
    Pty,
    Snapshot,
    LogToggle,
    None,
}

/// Point-in-time stats returned alongside [`LiveCapture::get_content`].
#[derive(Debug, Clone)]
pub struct CaptureStats {
    pub session_name: Option<String>,
    pub method: CaptureMethod,
    pub paused: bool,
    pub capture_count: u64,
    pub error_count: u64,
    pub last_capture_millis: Option<u64>,
}

/// Result of [`LiveCapture::get_content`].
#[derive(Debug, Clone)]
pub struct CaptureContent {
    pub lines: Vec<String>,
    pub method: CaptureMethod,
    pub stats: CaptureStats,
}

struct Inner {
    driver: Arc<dyn MultiplexerDriver>,
    events: EventSender,
    tmpfs_dir: PathBuf,
    fallback_dir: PathBuf,
    poll_interval: Duration,
    liveness_interval: Duration,
    ring_capacity: usize,

    session_name: StdMutex<Option<String>>,
    buffer: StdMutex<RingBuffer>,
    method: StdMutex<CaptureMethod>,
    paused: AtomicBool,
    capture_count: AtomicU64,
    error_count: AtomicU64,
    started_at: StdMutex<Option<Instant>>,
    pty: StdMutex<Option<Arc<PtyAttach>>>,
    cancel: StdMutex<Option<CancellationToken>>,
    destroyed: AtomicBool,
    seq: AtomicU64,
}

/// Per-session live view (§3 `CaptureState` + §4.2). Cheaply cloneable:
/// clones share the same underlying state and background tasks.
#[derive(Clone)]
pub struct LiveCapture(Arc<Inner>);

impl LiveCapture {
    pub fn new(
        driver: Arc<dyn MultiplexerDriver>,
        events: EventSender,
        tmpfs_dir: PathBuf,
        ring_capacity: usize,
    ) -> Self {
        Self(Arc::new(Inner {
            driver,
            events,
            tmpfs_dir,
            fallback_dir: std::env::temp_dir(),
            poll_interval: DEFAULT_SNAPSHOT_POLL,
            liveness_interval: LIVENESS_POLL,
            ring_capacity,
            session_name: StdMutex::new(None),
            buffer: StdMutex::new(RingBuffer::new(ring_capacity)),
            method: StdMutex::new(CaptureMethod::None),
            paused: AtomicBool::new(false),
            capture_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            started_at: StdMutex::new(None),
            pty: StdMutex::new(None),
            cancel: StdMutex::new(None),
            destroyed: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }))
    }

    pub fn with_poll_interval(self, interval: Duration) -> Self {
        // `Arc` is shared on `clone`, so rebuild poll_interval requires a
        // fresh `Inner`; callers set this immediately after `new`, before
        // any clone has escaped, so this is safe in practice.
        let inner = &self.0;
        Self(Arc::new(Inner {
            driver: inner.driver.clone(),
            events: inner.events.clone(),
            tmpfs_dir: inner.tmpfs_dir.clone(),
            fallback_dir: inner.fallback_dir.clone(),
            poll_interval: interval,
            liveness_interval: interval,
            ring_capacity: inner.ring_capacity,
            session_name: StdMutex::new(None),
            buffer: StdMutex::new(RingBuffer::new(inner.ring_capacity)),
            method: StdMutex::new(CaptureMethod::None),
            paused: AtomicBool::new(false),
            capture_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            started_at: StdMutex::new(None),
            pty: StdMutex::new(None),
            cancel: StdMutex::new(None),
            destroyed: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }))
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, RingBuffer> {
        self.0.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_method(&self) -> std::sync::MutexGuard<'_, CaptureMethod> {
        self.0.method.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind to `session`, clearing prior state, and attempt the pty →
    /// snapshot → log-toggle fallback chain (§4.2).
    pub async fn start(&self, session: impl Into<String>) -> Result<(), ErrorCode> {
        self.stop();
        let name = session.into();

        {
            let mut session_name = self.0.session_name.lock().unwrap_or_else(|e| e.into_inner());
            *session_name = Some(name.clone());
        }
        self.lock_buffer().clear();
        *self.lock_method() = CaptureMethod::None;
        self.0.destroyed.store(false, Ordering::SeqCst);
        self.0.paused.store(false, Ordering::SeqCst);
        *self.0.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());

        let cancel = CancellationToken::new();
        *self.0.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let _ = self.0.driver.resize(&name, PTY_COLS, PTY_ROWS).await;

        let argv = self.0.driver.attach_argv(&name);
        match PtyAttach::spawn(&argv, PTY_COLS, PTY_ROWS) {
            Ok(pty) => {
                let pty = Arc::new(pty);
                *self.0.pty.lock().unwrap_or_else(|e| e.into_inner()) = Some(pty.clone());
                *self.lock_method() = CaptureMethod::Pty;
                self.spawn_pty_reader(pty, cancel.clone());
            }
            Err(_) => {
                self.fall_back_to_snapshot(&name, cancel.clone()).await;
            }
        }

        self.spawn_liveness_monitor(name, cancel);
        Ok(())
    }

    /// Attempt a probe snapshot; on failure downgrade permanently to
    /// log-toggle (§4.2 item 3, "used only as last resort").
    async fn fall_back_to_snapshot(&self, name: &str, cancel: CancellationToken) {
        *self.lock_method() = CaptureMethod::Snapshot;
        match self.do_snapshot(name).await {
            Ok(()) => self.spawn_snapshot_poll(name.to_string(), cancel),
            Err(_) => {
                *self.lock_method() = CaptureMethod::LogToggle;
                self.spawn_log_toggle_poll(name.to_string(), cancel);
            }
        }
    }

    fn spawn_pty_reader(&self, pty: Arc<PtyAttach>, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = pty.read(&mut buf) => {
                        match result {
                            Ok(0) => {
                                this.0.error_count.fetch_add(1, Ordering::Relaxed);
                                this.emit(Event::CaptureError {
                                    session: this.session_name().unwrap_or_default(),
                                    error: ErrorCode::CaptureMethodFailed,
                                });
                                if let Some(name) = this.session_name() {
                                    this.fall_back_to_snapshot(&name, cancel.clone()).await;
                                }
                                return;
                            }
                            Ok(n) => {
                                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                                this.lock_buffer().append_data(&text);
                                this.mark_captured();
                                this.emit(Event::CaptureData {
                                    session: this.session_name().unwrap_or_default(),
                                    bytes: bytes::Bytes::copy_from_slice(&buf[..n]),
                                });
                            }
                            Err(_) => {
                                this.0.error_count.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            }
        });
    }

    fn spawn_snapshot_poll(&self, name: String, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.0.poll_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        if this.0.paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        let _ = this.do_snapshot(&name).await;
                    }
                }
            }
        });
    }

    fn spawn_log_toggle_poll(&self, name: String, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.0.poll_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        if this.0.paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        let _ = this.do_log_toggle(&name).await;
                    }
                }
            }
        });
    }

    fn spawn_liveness_monitor(&self, name: String, cancel: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.0.liveness_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        let alive = this.0.driver.exists(&name).await.unwrap_or(false);
                        if !alive {
                            this.emit(Event::CaptureSessionDead { session: name.clone() });
                            this.stop();
                            return;
                        }
                    }
                }
            }
        });
    }

    async fn do_snapshot(&self, name: &str) -> Result<(), ErrorCode> {
        let path = self.snapshot_path();
        let result = self.0.driver.snapshot(name, &path).await;
        let path = match result {
            Ok(()) => path,
            Err(ErrorCode::PermissionDeniedByHost) => {
                let fallback = self.0.fallback_dir.join(path.file_name().unwrap_or_default());
                self.0.driver.snapshot(name, &fallback).await?;
                fallback
            }
            Err(e) => {
                self.0.error_count.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        let raw = tokio::fs::read(&path).await.map_err(|_| ErrorCode::CaptureMethodFailed)?;
        let _ = tokio::fs::remove_file(&path).await;
        let text = filter::strip_c0_except_esc(&String::from_utf8_lossy(&raw));
        self.lock_buffer().clear();
        self.lock_buffer().append_data(&text);
        self.mark_captured();
        Ok(())
    }

    async fn do_log_toggle(&self, name: &str) -> Result<(), ErrorCode> {
        let path = self.snapshot_path();
        self.0.driver.log_toggle(name, true, &path).await?;
        tokio::time::sleep(LOG_TOGGLE_WINDOW).await;
        self.0.driver.log_toggle(name, false, &path).await?;
        let raw = tokio::fs::read(&path).await.map_err(|_| ErrorCode::CaptureMethodFailed)?;
        let _ = tokio::fs::remove_file(&path).await;
        let text = filter::strip_c0_except_esc(&String::from_utf8_lossy(&raw));
        self.lock_buffer().clear();
        self.lock_buffer().append_data(&text);
        self.mark_captured();
        Ok(())
    }

    fn snapshot_path(&self) -> PathBuf {
        let seq = self.0.seq.fetch_add(1, Ordering::Relaxed);
        self.0.tmpfs_dir.join(format!("warden-capture-{}-{}.txt", std::process::id(), seq))
    }

    fn mark_captured(&self) {
        self.0.capture_count.fetch_add(1, Ordering::Relaxed);
    }

    fn emit(&self, event: Event) {
        self.0.events.emit(event);
    }

    pub fn session_name(&self) -> Option<String> {
        self.0.session_name.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn method(&self) -> CaptureMethod {
        *self.lock_method()
    }

    /// Read the last `n` lines (or all, if `n` is `None`). In snapshot
    /// method, performs an on-demand capture first if the buffer is stale
    /// (§4.2: age > 2 × poll interval).
    pub async fn get_content(&self, n: Option<usize>) -> CaptureContent {
        let method = self.method();
        if method == CaptureMethod::Snapshot {
            let stale = !self.lock_buffer().is_fresh(self.0.poll_interval * 2);
            if stale {
                if let Some(name) = self.session_name() {
                    let _ = self.do_snapshot(&name).await;
                }
            }
        }

        let lines = match n {
            Some(n) => self.lock_buffer().last(n),
            None => self.lock_buffer().all(),
        };
        CaptureContent { lines, method: self.method(), stats: self.stats() }
    }

    pub fn stats(&self) -> CaptureStats {
        let last_capture_millis = self
            .0
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.elapsed().as_millis() as u64);
        CaptureStats {
            session_name: self.session_name(),
            method: self.method(),
            paused: self.0.paused.load(Ordering::SeqCst),
            capture_count: self.0.capture_count.load(Ordering::Relaxed),
            error_count: self.0.error_count.load(Ordering::Relaxed),
            last_capture_millis,
        }
    }

    /// Escape and inject `text`, optionally pressing Enter after.
    /// Returns `false` if no session is bound or on transport error.
    pub async fn send_input(&self, text: &str, press_enter: bool) -> bool {
        let Some(name) = self.session_name() else { return false };
        let mut payload = text.as_bytes().to_vec();
        if press_enter {
            payload.push(b'\r');
        }
        self.0.driver.stuff(&name, &payload).await.is_ok()
    }

    /// Send one of the closed set of special keys (§6). Rejects unknown
    /// names with [`ErrorCode::UnknownKey`] and performs no side effects.
    pub async fn send_key(&self, name: &str) -> Result<bool, ErrorCode> {
        let bytes = keys::lookup(name)?;
        let Some(session) = self.session_name() else { return Ok(false) };
        Ok(self.0.driver.stuff(&session, bytes).await.is_ok())
    }

    /// `stop()` + clear + rebind + (optionally) `start()` (§4.2).
    pub async fn switch_session(&self, new_name: impl Into<String>, restart: bool) -> Result<(), ErrorCode> {
        self.stop();
        self.lock_buffer().clear();
        let name = new_name.into();
        if restart {
            self.start(name).await
        } else {
            *self.0.session_name.lock().unwrap_or_else(|e| e.into_inner()) = Some(name);
            Ok(())
        }
    }

    /// Only affects snapshot/log-toggle polling; the pty stream, if active,
    /// is unaffected (§4.2).
    pub fn pause(&self) {
        self.0.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
    }

    /// Cancel timers and kill the pty child, if any. Keeps the buffer
    /// intact. Idempotent.
    pub fn stop(&self) {
        if let Some(cancel) = self.0.cancel.lock().unwrap_or_else(|e| e.into_inner()).take() {
            cancel.cancel();
        }
        *self.0.pty.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Terminal: stop and mark the instance unusable. `start()` after this
    /// is a caller error but is handled gracefully by re-initializing.
    pub fn destroy(&self) {
        self.stop();
        self.0.destroyed.store(true, Ordering::SeqCst);
        *self.0.session_name.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C5 — AutonomousController (§4.3): drives one session toward completion
//! of one prompt within a deadline, minimizing human intervention.

pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::capture::LiveCapture;
use crate::events::{Event, EventSender};
use crate::mux::MultiplexerDriver;
use crate::supervisor::{Role, SessionSupervisor};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_PROMPT_COOLDOWN: Duration = Duration::from_millis(5000);
const DEFAULT_REINFORCE_AFTER: Duration = Duration::from_secs(15 * 60);
const DEFAULT_MAX_REINFORCEMENTS: u32 = 3;
const READINESS_WAIT: Duration = Duration::from_secs(5);
const PERMISSION_SCAN_LINES: usize = 30;
const READ_LINES: usize = 200;
const POST_PERMISSION_SLEEP: Duration = Duration::from_secs(1);

/// Why an [`AutoRun`] ended (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Completed,
    TimeLimit,
    SessionTerminated,
    StartFailed,
    MaxReinforcements,
}

/// Tunable knobs for [`AutonomousController::run`] (§4.3, defaults per spec).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub prompt_cooldown: Duration,
    pub auto_accept_permissions: bool,
    pub auto_allow_dont_ask_again: bool,
    pub reinforce_after: Duration,
    pub max_reinforcements: u32,
    /// Wait for session readiness before sending the prompt (§4.3
    /// initialization step 3, default 5s). Broken out as a field, rather
    /// than hardcoded, so tests can shrink it.
    pub readiness_wait: Duration,
    /// Poll interval for the internal `LiveCapture`'s snapshot method.
    /// Broken out so tests can shrink capture staleness windows too.
    pub capture_poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            prompt_cooldown: DEFAULT_PROMPT_COOLDOWN,
            auto_accept_permissions: true,
            auto_allow_dont_ask_again: true,
            reinforce_after: DEFAULT_REINFORCE_AFTER,
            max_reinforcements: DEFAULT_MAX_REINFORCEMENTS,
            readiness_wait: READINESS_WAIT,
            capture_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Final report of one autonomous run (§4.3 "Returned report").
#[derive(Debug, Clone, Serialize)]
pub struct AutoRunReport {
    pub exit_reason: ExitReason,
    pub completed_successfully: bool,
    pub permissions_handled: u32,
    pub reinforcements: u32,
    /// Error-pattern hits recorded but not acted on (§7: "the
    /// AutonomousController swallows and accumulates most errors").
    pub errors_observed: u32,
    pub started_at_millis: u64,
    pub ended_at_millis: u64,
}

struct Rules {
    permission: Vec<rules::Rule>,
    stuck: Vec<rules::Rule>,
    error: Vec<rules::Rule>,
    completion: regex::Regex,
}

impl Rules {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            permission: rules::permission_patterns()?,
            stuck: rules::stuck_patterns()?,
            error: rules::error_patterns()?,
            completion: rules::completion_pattern()?,
        })
    }
}

/// Drives one `LiveCapture`-backed session toward completion of one prompt.
/// Exclusively owns its `LiveCapture` for the duration of one `AutoRun`.
pub struct AutonomousController {
    driver: Arc<dyn MultiplexerDriver>,
    events: EventSender,
    config: ControllerConfig,
    rules: Rules,
}

impl AutonomousController {
    pub fn new(
        driver: Arc<dyn MultiplexerDriver>,
        events: EventSender,
        config: ControllerConfig,
    ) -> anyhow::Result<Self> {
        let rules = Rules::compile()?;
        Ok(Self { driver, events, config, rules })
    }

    /// Run one `AutoRun`: start (or restart) `session_name` in `project_path`
    /// running `command`, send `prompt`, and drive it until completion, the
    /// deadline, or the session dying, per the §4.3 initialization and main
    /// loop.
    pub async fn run(
        &self,
        project_path: &std::path::Path,
        command: &[String],
        prompt: &str,
        deadline_duration: Duration,
    ) -> AutoRunReport {
        let started_at = Instant::now();
        let started_at_millis = wall_clock_millis();

        let supervisor = SessionSupervisor::new(self.driver.clone(), self.events.clone());

        // Step 1: ensure absent, else kill.
        if let Ok(existing) = supervisor.list(project_path).await {
            for handle in existing.into_iter().filter(|h| h.role == Role::Agent) {
                let _ = self.driver.kill(&handle.name).await;
            }
        }

        // Step 2: start with a large scrollback.
        let handle = match supervisor.start(project_path, Role::Agent, command).await {
            Ok(h) => h,
            Err(_) => {
                return self.finish(started_at_millis, ExitReason::StartFailed, 0, 0, 0, false);
            }
        };

        // Step 3: wait for readiness.
        tokio::time::sleep(self.config.readiness_wait).await;

        // Step 4: send the augmented prompt.
        let tmpfs_dir = std::env::temp_dir();
        let capture = LiveCapture::new(self.driver.clone(), self.events.clone(), tmpfs_dir, READ_LINES * 8)
            .with_poll_interval(self.config.capture_poll_interval);
        if capture.start(handle.name.clone()).await.is_err() {
            return self.finish(started_at_millis, ExitReason::StartFailed, 0, 0, 0, false);
        }

        let augmented = augment_prompt(prompt);
        capture.send_input(&augmented, true).await;
        tokio::time::sleep(self.config.prompt_cooldown).await;

        let deadline = started_at + deadline_duration;
        let report = self.tick_loop(&handle.name, &capture, prompt, started_at, deadline).await;

        capture.destroy();
        let (reason, completed, permissions, reinforcements, errors_observed) = report;
        self.events.emit(Event::AutoCompleted { session: handle.name.clone(), exit_reason: reason });
        self.finish(started_at_millis, reason, permissions, reinforcements, errors_observed, completed)
    }

    async fn tick_loop(
        &self,
        session_name: &str,
        capture: &LiveCapture,
        original_prompt: &str,
        started_at: Instant,
        deadline: Instant,
    ) -> (ExitReason, bool, u32, u32, u32) {
        let mut permissions_handled = 0u32;
        let mut reinforcements = 0u32;
        let mut errors_observed = 0u32;
        let mut last_observed_output = String::new();
        let mut last_reinforcement_at = started_at;
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            // Step 1: liveness.
            if !self.driver.exists(session_name).await.unwrap_or(false) {
                return (ExitReason::SessionTerminated, false, permissions_handled, reinforcements, errors_observed);
            }

            // Step 2: deadline.
            let now = Instant::now();
            if now >= deadline {
                return (ExitReason::TimeLimit, false, permissions_handled, reinforcements, errors_observed);
            }

            // Step 3: read.
            let content = capture.get_content(Some(READ_LINES)).await;
            let joined = content.lines.join("\n");

            // Step 4: permission scan (priority over completion).
            let tail: String = content
                .lines
                .iter()
                .rev()
                .take(PERMISSION_SCAN_LINES)
                .cloned()
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");

            if self.config.auto_accept_permissions {
                if let Some(rule_id) = self.scan(&self.rules.permission, &tail) {
                    if self.config.auto_allow_dont_ask_again {
                        capture.send_key("down").await.ok();
                        capture.send_key("enter").await.ok();
                    } else {
                        capture.send_key("enter").await.ok();
                    }
                    permissions_handled += 1;
                    self.events.emit(Event::AutoPermissionHandled {
                        session: session_name.to_string(),
                        rule_id: rule_id.to_string(),
                    });
                    tokio::time::sleep(POST_PERMISSION_SLEEP).await;
                    last_observed_output = joined;
                    continue;
                }
            }

            // Step 5: completion scan (over the entire buffer).
            if self.rules.completion.is_match(&joined) {
                return (ExitReason::Completed, true, permissions_handled, reinforcements, errors_observed);
            }

            // Step 6: stuck scan, only on changed output. At most one
            // external action per tick (§4.3 ordering guarantees), so a
            // nudge here skips step 7 entirely rather than falling through
            // to a possible reinforcement in the same iteration.
            if joined != last_observed_output {
                if self.scan(&self.rules.stuck, &tail).is_some() {
                    let nudge = format!(
                        "\n\nReminder: your objective is:\n{original_prompt}\n\nPlease proceed without asking clarifying questions.\n"
                    );
                    capture.send_input(&nudge, true).await;
                    if self.scan(&self.rules.error, &tail).is_some() {
                        errors_observed += 1;
                    }
                    last_observed_output = joined;
                    continue;
                }
                if self.scan(&self.rules.error, &tail).is_some() {
                    errors_observed += 1;
                }
            }

            // Step 7: reinforcement.
            let elapsed = now.saturating_duration_since(started_at);
            if elapsed > self.config.reinforce_after
                && now.saturating_duration_since(last_reinforcement_at) > self.config.reinforce_after
                && reinforcements < self.config.max_reinforcements
            {
                let remaining = deadline.saturating_duration_since(now);
                let reinforcement = format!(
                    "\n\nReinforcement: you still have {} remaining. Original objective:\n{original_prompt}\n",
                    format_duration(remaining)
                );
                capture.send_input(&reinforcement, true).await;
                reinforcements += 1;
                last_reinforcement_at = now;
                if reinforcements >= self.config.max_reinforcements {
                    debug!(session = session_name, "max reinforcements reached");
                }
            }

            // Step 8: persist.
            last_observed_output = joined;
        }
    }

    fn scan<'a>(&self, table: &'a [rules::Rule], text: &str) -> Option<&'a str> {
        table.iter().find(|r| r.pattern.is_match(text)).map(|r| r.id)
    }

    fn finish(
        &self,
        started_at_millis: u64,
        exit_reason: ExitReason,
        permissions_handled: u32,
        reinforcements: u32,
        errors_observed: u32,
        completed_successfully: bool,
    ) -> AutoRunReport {
        info!(?exit_reason, completed_successfully, "autonomous run finished");
        AutoRunReport {
            exit_reason,
            completed_successfully,
            permissions_handled,
            reinforcements,
            errors_observed,
            started_at_millis,
            ended_at_millis: wall_clock_millis(),
        }
    }
}

/// Append the completion-sentinel instruction to the user's prompt (§4.3
/// initialization step 4).
fn augment_prompt(prompt: &str) -> String {
    format!(
        "{prompt}\n\nWhen you have fully completed this task, output the exact phrase \"completed completed completed\" on its own line.\n"
    )
}

fn format_duration(d: Duration) -> String {
    let total_minutes = d.as_secs() / 60;
    format!("{}h{:02}m", total_minutes / 60, total_minutes % 60)
}

fn wall_clock_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

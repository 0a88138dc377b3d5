// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Precompiled, named pattern tables for the AutonomousController's scan
//! steps (§4.3). Each rule carries an id so the emitted
//! `auto:permissionHandled` event can name the rule that fired, in the same
//! style as the teacher's `DIALOG_SCREENS` signal tables.
//!
//! Patterns are compiled once at controller construction time and threaded
//! through as `Result`, rather than asserted infallible, so a malformed
//! built-in pattern surfaces as a startup error instead of a panic.

use regex::{Regex, RegexBuilder};

/// One named, case-insensitive regex rule.
pub struct Rule {
    pub id: &'static str,
    pub pattern: Regex,
}

fn compile(id: &'static str, pattern: &str) -> Result<Rule, regex::Error> {
    let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok(Rule { id, pattern })
}

/// Permission-dialog prompts (§4.3 step 4): "do you want to proceed?",
/// "don't ask again", trust dialogs, and similar y/n gates.
pub fn permission_patterns() -> Result<Vec<Rule>, regex::Error> {
    Ok(vec![
        compile("permission:proceed", r"do you want to proceed\??")?,
        compile("permission:dont-ask-again", r"don'?t ask again")?,
        compile("permission:allow", r"\ballow\b.*\?")?,
        compile("permission:trust-folder", r"do you trust the (files|folder)")?,
        compile("permission:yes-no", r"\(y/n\)")?,
    ])
}

/// Stuck/looping indicators (§4.3 step 6): the agent appears to be waiting
/// on something other than a recognized permission dialog.
pub fn stuck_patterns() -> Result<Vec<Rule>, regex::Error> {
    Ok(vec![
        compile("stuck:waiting-for-input", r"waiting for (your )?input")?,
        compile("stuck:what-would-you-like", r"what would you like")?,
        compile("stuck:anything-else", r"is there anything else")?,
        compile("stuck:no-progress", r"i('m| am) not sure (how|what) to proceed")?,
    ])
}

/// Error indicators the controller records but does not act on beyond
/// counting (§7: errors are swallowed and accumulated by the controller).
pub fn error_patterns() -> Result<Vec<Rule>, regex::Error> {
    Ok(vec![
        compile("error:generic", r"\berror\b")?,
        compile("error:traceback", r"traceback \(most recent call last\)")?,
        compile("error:panic", r"\bpanic(ked)?\b")?,
        compile("error:failed", r"\bfailed\b")?,
    ])
}

/// The sentinel completion phrase (§4.3): `completed completed completed`,
/// case-insensitive, any whitespace between the three tokens.
pub fn completion_pattern() -> Result<Regex, regex::Error> {
    RegexBuilder::new(r"completed\s+completed\s+completed").case_insensitive(true).build()
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;

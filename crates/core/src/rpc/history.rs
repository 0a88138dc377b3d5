// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded history ring for [`super::bridge::RpcBridge`] (§4.4): the last
//! `capacity` request/response/error/notification entries, oldest evicted
//! first.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// Default bounded history depth (§4.4).
pub const DEFAULT_HISTORY: usize = 50;

/// Result previews longer than this are truncated (§3 `HistoryEntry`:
/// "response (with short preview)").
const PREVIEW_LEN: usize = 200;

/// One recorded event on the bridge's wire, each carrying a timestamp (§3).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Request { id: u64, method: String, params: Value, timestamp: u64 },
    Response { id: u64, result_preview: String, timestamp: u64 },
    Error { id: Option<u64>, message: String, timestamp: u64 },
    Notification { method: String, params: Value, timestamp: u64 },
}

/// Current wall-clock time in milliseconds since the Unix epoch, for
/// stamping history entries as they're constructed.
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Truncate a JSON result to a short display preview (§3 "short preview").
pub fn preview(result: &Value) -> String {
    let rendered = result.to_string();
    if rendered.chars().count() <= PREVIEW_LEN {
        rendered
    } else {
        let truncated: String = rendered.chars().take(PREVIEW_LEN).collect();
        format!("{truncated}…")
    }
}

/// Bounded circular store of [`HistoryEntry`] values.
#[derive(Debug)]
pub struct HistoryRing {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: VecDeque::with_capacity(capacity.min(256)) }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, line-oriented scrollback buffer.
//!
//! Unlike a byte-oriented ring, this buffer is newline-aware: `append_data`
//! coalesces partial writes onto the most recently started line instead of
//! splitting a line's bytes across two stored entries. ANSI escape sequences
//! embedded in a line's bytes are opaque to this type and are never stripped,
//! reordered, or split.

use std::collections::VecDeque;
use std::time::Instant;

/// Bounded circular store of scrollback lines.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    lines: VecDeque<String>,
    /// The line currently being written to, not yet newline-terminated.
    open: String,
    total_appended: u64,
    last_update: Option<Instant>,
}

/// Point-in-time snapshot returned by [`RingBuffer::last`]/[`RingBuffer::all`].
#[derive(Debug, Clone, Default)]
pub struct RingStats {
    pub capacity: usize,
    pub count: usize,
    pub total_appended: u64,
}

impl RingBuffer {
    /// Create a new ring buffer holding up to `capacity` completed lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: VecDeque::with_capacity(capacity.min(4096)),
            open: String::new(),
            total_appended: 0,
            last_update: None,
        }
    }

    /// Push one already-complete line directly, bypassing partial-line
    /// coalescing. Evicts the oldest line if at capacity.
    pub fn push(&mut self, line: impl Into<String>) {
        self.push_completed(line.into());
        self.touch();
    }

    /// Feed raw bytes (or text) that may contain zero or more newlines.
    ///
    /// A leading fragment that does not begin a fresh line (i.e. the data
    /// did not start with `\n`) is concatenated onto the current open line.
    /// Every `\n` encountered closes the line in progress and starts a new
    /// open line from whatever follows.
    pub fn append_data(&mut self, data: &str) {
        if data.is_empty() {
            return;
        }
        let mut parts = data.split('\n');
        // The leading fragment always extends the current open line, even
        // when empty (data starting with '\n' closes the open line as-is).
        if let Some(first) = parts.next() {
            self.open.push_str(first);
        }

        let mut closed_any = false;
        let rest: Vec<&str> = parts.collect();
        if let Some((last, middle)) = rest.split_last() {
            closed_any = true;
            let finished = std::mem::take(&mut self.open);
            self.push_completed(finished);
            for part in middle {
                self.push_completed((*part).to_string());
            }
            self.open = (*last).to_string();
        }
        let _ = closed_any;
        self.touch();
    }

    fn push_completed(&mut self, line: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.total_appended += 1;
    }

    fn touch(&mut self) {
        self.last_update = Some(Instant::now());
    }

    /// The last `n` visible lines (completed lines plus the in-progress
    /// open line, if it has any content).
    pub fn last(&self, n: usize) -> Vec<String> {
        let all = self.all();
        let start = all.len().saturating_sub(n);
        all[start..].to_vec()
    }

    /// All visible lines: every completed line, in arrival order, plus the
    /// open line if non-empty.
    pub fn all(&self) -> Vec<String> {
        let mut out: Vec<String> = self.lines.iter().cloned().collect();
        if !self.open.is_empty() {
            out.push(self.open.clone());
        }
        out
    }

    /// Reset to empty: no completed lines, no open line, counters cleared.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.open.clear();
        self.total_appended = 0;
        self.last_update = None;
    }

    /// Whether the buffer has been updated within `max_age`.
    pub fn is_fresh(&self, max_age: std::time::Duration) -> bool {
        match self.last_update {
            Some(t) => t.elapsed() <= max_age,
            None => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    pub fn stats(&self) -> RingStats {
        RingStats { capacity: self.capacity, count: self.count(), total_appended: self.total_appended }
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;

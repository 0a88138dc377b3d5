// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C6 — RpcBridge (§4.4): JSON-RPC 2.0 client over a Unix domain socket to
//! an out-of-process collaborator. Independent of C3/C4/C5: a dead or
//! unreachable RPC peer never blocks session capture or the autonomous
//! controller, it only degrades what the dashboard can report.

pub mod bridge;
pub mod history;

pub use bridge::{RpcBridge, DEFAULT_REQUEST_TIMEOUT};
pub use history::{HistoryEntry, HistoryRing, DEFAULT_HISTORY};

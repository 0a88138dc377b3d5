// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared HTTP/WS transport plumbing for the dashboard façade (§6).

pub mod auth;
pub mod state;

use serde::Serialize;

use crate::error::ErrorBody;

/// The `{error: {code, message}}` body every dashboard HTTP error returns.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

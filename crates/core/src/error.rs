// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error codes shared across the supervisor, capture, controller,
/// RPC bridge, and dashboard HTTP/WS surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ToolingMissing,
    SessionNotFound,
    SessionStartTimeout,
    SessionDead,
    CaptureMethodFailed,
    TransportError,
    RequestTimeout,
    MalformedFrame,
    UnknownKey,
    InvalidInput,
    PermissionDeniedByHost,
    Unauthorized,
    BadRequest,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ToolingMissing => 503,
            Self::SessionNotFound => 404,
            Self::SessionStartTimeout => 504,
            Self::SessionDead => 410,
            Self::CaptureMethodFailed => 503,
            Self::TransportError => 503,
            Self::RequestTimeout => 504,
            Self::MalformedFrame => 502,
            Self::UnknownKey => 400,
            Self::InvalidInput => 400,
            Self::PermissionDeniedByHost => 403,
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolingMissing => "TOOLING_MISSING",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::SessionStartTimeout => "SESSION_START_TIMEOUT",
            Self::SessionDead => "SESSION_DEAD",
            Self::CaptureMethodFailed => "CAPTURE_METHOD_FAILED",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::MalformedFrame => "MALFORMED_FRAME",
            Self::UnknownKey => "UNKNOWN_KEY",
            Self::InvalidInput => "INVALID_INPUT",
            Self::PermissionDeniedByHost => "PERMISSION_DENIED_BY_HOST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }

    /// Render as the `{error: {code, message}}` body the dashboard HTTP API returns.
    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str(), message: message.into() }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ErrorCode {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

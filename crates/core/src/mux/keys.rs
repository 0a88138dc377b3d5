// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of special key names accepted by `sendKey` (§6), each
//! mapped to its fixed byte sequence.

use crate::error::ErrorCode;

/// Look up the byte sequence for a named key. Case-sensitive, matching the
/// exact spelling in §6 (`ctrl-c`, `shift-tab`, `f1`..`f12`, ...).
pub fn lookup(name: &str) -> Result<&'static [u8], ErrorCode> {
    let bytes: &'static [u8] = match name {
        "enter" => b"\r",
        "tab" => b"\t",
        "backspace" => b"\x7f",
        "ctrl-c" => b"\x03",
        "ctrl-d" => b"\x04",
        "ctrl-z" => b"\x1a",
        "ctrl-l" => b"\x0c",
        "ctrl-a" => b"\x01",
        "ctrl-e" => b"\x05",
        "ctrl-u" => b"\x15",
        "ctrl-k" => b"\x0b",
        "ctrl-w" => b"\x17",
        "esc" => b"\x1b",
        "up" => b"\x1b[A",
        "down" => b"\x1b[B",
        "left" => b"\x1b[D",
        "right" => b"\x1b[C",
        "home" => b"\x1b[H",
        "end" => b"\x1b[F",
        "delete" => b"\x1b[3~",
        "page-up" => b"\x1b[5~",
        "page-down" => b"\x1b[6~",
        "shift-tab" => b"\x1b[Z",
        "insert" => b"\x1b[2~",
        "f1" => b"\x1bOP",
        "f2" => b"\x1bOQ",
        "f3" => b"\x1bOR",
        "f4" => b"\x1bOS",
        "f5" => b"\x1b[15~",
        "f6" => b"\x1b[17~",
        "f7" => b"\x1b[18~",
        "f8" => b"\x1b[19~",
        "f9" => b"\x1b[20~",
        "f10" => b"\x1b[21~",
        "f11" => b"\x1b[23~",
        "f12" => b"\x1b[24~",
        _ => return Err(ErrorCode::UnknownKey),
    };
    Ok(bytes)
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn strips_c0_controls_but_keeps_esc() {
    let input = "a\x01b\x1b[31mred\x1b[0m\x7fc";
    let out = strip_c0_except_esc(input);
    assert_eq!(out, "ab\x1b[31mred\x1b[0mc");
}

#[test]
fn leaves_plain_text_untouched() {
    assert_eq!(strip_c0_except_esc("hello world"), "hello world");
}

#[test]
fn strips_newline_adjacent_controls_without_touching_newlines() {
    let input = "line1\nline2\x0bline3";
    assert_eq!(strip_c0_except_esc(input), "line1\nline2line3");
}

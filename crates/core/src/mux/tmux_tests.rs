// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_session_line_reads_three_tab_separated_fields() -> anyhow::Result<()> {
    let rec = parse_session_line("agent-foo-abcd1234\t1700000000\t1")
        .ok_or_else(|| anyhow::anyhow!("expected Some"))?;
    assert_eq!(rec.name, "agent-foo-abcd1234");
    assert_eq!(rec.date, "1700000000");
    assert_eq!(rec.state, SessionState::Attached);
    Ok(())
}

#[test]
fn parse_session_line_marks_detached_when_not_attached() -> anyhow::Result<()> {
    let rec = parse_session_line("s\t0\t0").ok_or_else(|| anyhow::anyhow!("expected Some"))?;
    assert_eq!(rec.state, SessionState::Detached);
    Ok(())
}

#[test]
fn parse_session_line_rejects_short_lines() {
    assert!(parse_session_line("s\t0").is_none());
    assert!(parse_session_line("").is_none());
}

#[tokio::test]
async fn spawn_with_empty_command_is_invalid_input() {
    let driver = TmuxDriver::new();
    let result = driver.spawn("x", &[], 5000).await;
    assert_eq!(result, Err(ErrorCode::InvalidInput));
}

#[test]
fn stuff_command_line_dollar_quotes_payload_for_shell_interpretation() {
    let line = stuff_command_line(None, "agent-foo-abcd1234", &[0x1b, b'[', b'A']);
    assert_eq!(line, "tmux send-keys -t 'agent-foo-abcd1234' -l $'\\033[A'");
}

#[test]
fn stuff_command_line_includes_socket_when_set() {
    let line = stuff_command_line(Some(Path::new("/tmp/warden.sock")), "s", b"hi");
    assert_eq!(line, "tmux -S '/tmp/warden.sock' send-keys -t 's' -l $'hi'");
}

#[test]
fn stuff_command_line_shell_quotes_session_name_with_special_chars() {
    // Session names are derived from a fixed alnum+hyphen rule, but the
    // quoting must not assume that to stay safe in depth.
    let line = stuff_command_line(None, "it's-a-name", b"x");
    assert_eq!(line, "tmux send-keys -t 'it'\\''s-a-name' -l $'x'");
}

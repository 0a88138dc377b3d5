// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn spawn_rejects_empty_command() {
    let result = PtyAttach::spawn(&[], 80, 24);
    assert!(result.is_err());
}

#[tokio::test]
async fn echo_roundtrips_through_the_pty() -> anyhow::Result<()> {
    let pty = PtyAttach::spawn(&["/bin/cat".to_string()], 80, 24)?;
    pty.write(b"hello\n").await?;

    let mut buf = [0u8; 256];
    let mut collected = Vec::new();
    for _ in 0..20 {
        let n = pty.read(&mut buf).await?;
        collected.extend_from_slice(&buf[..n]);
        if collected.windows(5).any(|w| w == b"hello") {
            break;
        }
    }
    assert!(String::from_utf8_lossy(&collected).contains("hello"));
    Ok(())
}

#[tokio::test]
async fn exit_status_reflects_clean_exit() -> anyhow::Result<()> {
    let pty =
        PtyAttach::spawn(&["/bin/sh".to_string(), "-c".to_string(), "exit 3".to_string()], 80, 24)?;
    let status = pty.wait().await?;
    assert_eq!(status.code, Some(3));
    Ok(())
}

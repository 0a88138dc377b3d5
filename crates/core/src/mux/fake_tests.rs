// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn spawn_then_exists_then_kill() -> anyhow::Result<()> {
    let driver = FakeDriver::new();
    assert!(!driver.exists("s1").await?);
    driver.spawn("s1", &["bash".to_string()], 5000).await?;
    assert!(driver.exists("s1").await?);
    driver.kill("s1").await?;
    assert!(!driver.exists("s1").await?);
    Ok(())
}

#[tokio::test]
async fn spawn_without_tooling_fails() -> anyhow::Result<()> {
    let driver = FakeDriver::without_tooling();
    assert_eq!(driver.ensure_tooling().await, Err(ErrorCode::ToolingMissing));
    assert_eq!(
        driver.spawn("s1", &["bash".to_string()], 5000).await,
        Err(ErrorCode::ToolingMissing)
    );
    Ok(())
}

#[tokio::test]
async fn stuff_against_missing_session_fails() {
    let driver = FakeDriver::new();
    assert_eq!(driver.stuff("missing", b"hi").await, Err(ErrorCode::SessionNotFound));
}

#[tokio::test]
async fn snapshot_writes_accumulated_screen_to_file() -> anyhow::Result<()> {
    let driver = FakeDriver::new();
    driver.seed_session("s1");
    driver.push_output("s1", b"hello\x1b[31mred\x1b[0m");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("snap.txt");
    driver.snapshot("s1", &path).await?;

    let contents = std::fs::read(&path)?;
    assert_eq!(contents, b"hello\x1b[31mred\x1b[0m");
    Ok(())
}

#[tokio::test]
async fn list_reflects_seeded_and_killed_sessions() -> anyhow::Result<()> {
    let driver = FakeDriver::new();
    driver.seed_session("a");
    driver.seed_session("b");
    let names: Vec<String> = driver.list().await?.into_iter().map(|s| s.name).collect();
    assert_eq!(names.len(), 2);

    driver.kill_externally("a");
    let names: Vec<String> = driver.list().await?.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["b".to_string()]);
    Ok(())
}

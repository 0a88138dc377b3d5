// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box end-to-end coverage driving the real `warden` binary through
//! its dashboard HTTP/WS façade.

use std::time::Duration;

use futures_util::StreamExt;
use warden_specs::{write_fake_agent, WardenBuilder};

/// A fake agent that immediately prints the completion sentinel the
/// controller's rule set watches for.
const COMPLETE_IMMEDIATELY: &str = r#"
echo "working on it"
sleep 1
echo "completed completed completed"
sleep 60
"#;

/// A fake agent that asks a permission question once, then completes once
/// it sees the accept keystroke land, and otherwise idles so the test can
/// observe the prompt on the transcript before completion.
const ASKS_PERMISSION: &str = r#"
echo "About to touch files."
echo "Do you want to proceed? (y/n)"
read answer
echo "got answer: $answer"
echo "completed completed completed"
sleep 60
"#;

/// Never emits anything recognizable; the controller should hit its time
/// limit rather than the completion path.
const NEVER_COMPLETES: &str = r#"
echo "thinking..."
sleep 120
"#;

#[tokio::test]
async fn health_endpoint_reports_ok_before_agent_finishes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), NEVER_COMPLETES)?;

    let process = WardenBuilder::new("say hello")?
        .duration("0:10")
        .agent_command(&agent)
        .with_dashboard()?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await?;

    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/api/v1/health", process.base_url())).send().await?;
    assert!(resp.status().is_success());

    Ok(())
}

#[tokio::test]
async fn completion_sentinel_ends_the_run_successfully() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), COMPLETE_IMMEDIATELY)?;

    let mut process = WardenBuilder::new("finish the task")?
        .duration("0:30")
        .agent_command(&agent)
        .with_dashboard()?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await?;

    let status = process.wait_exit(Duration::from_secs(25)).await?;
    assert!(status.success(), "expected clean exit on completion, got {status:?}");

    Ok(())
}

#[tokio::test]
async fn deadline_elapses_when_agent_never_signals_completion() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), NEVER_COMPLETES)?;

    let mut process = WardenBuilder::new("do something open ended")?
        .duration("0:05")
        .agent_command(&agent)
        .with_dashboard()?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await?;

    let status = process.wait_exit(Duration::from_secs(20)).await?;
    assert!(!status.success(), "expected non-zero exit on time limit, got {status:?}");

    Ok(())
}

#[tokio::test]
async fn permission_prompt_is_observed_on_the_session_transcript() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), ASKS_PERMISSION)?;

    let process = WardenBuilder::new("make a change")?
        .duration("0:20")
        .agent_command(&agent)
        .with_dashboard()?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await?;

    let client = reqwest::Client::new();
    let sessions_url = format!("{}/api/v1/sessions", process.base_url());

    let mut saw_prompt = false;
    for _ in 0..40 {
        let sessions: serde_json::Value = client.get(&sessions_url).send().await?.json().await?;
        if let Some(list) = sessions.as_array().filter(|l| !l.is_empty()) {
            let name = list[0]["name"].as_str().unwrap_or_default();
            let messages_url = format!("{}/api/v1/sessions/{name}/messages", process.base_url());
            if let Ok(resp) = client.get(&messages_url).send().await {
                if let Ok(body) = resp.text().await {
                    if body.contains("proceed") {
                        saw_prompt = true;
                        break;
                    }
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    assert!(saw_prompt, "expected the permission prompt to reach the transcript");
    Ok(())
}

#[tokio::test]
async fn dashboard_password_gates_unauthenticated_requests() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), NEVER_COMPLETES)?;

    let process = WardenBuilder::new("gated run")?
        .duration("0:10")
        .agent_command(&agent)
        .with_dashboard_password("correct horse battery staple")?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await.ok();

    let client = reqwest::Client::new();
    let sessions_url = format!("{}/api/v1/sessions", process.base_url());

    let unauthed = client.get(&sessions_url).send().await?;
    assert_eq!(unauthed.status(), reqwest::StatusCode::UNAUTHORIZED);

    let authed = client
        .get(&sessions_url)
        .bearer_auth("correct horse battery staple")
        .send()
        .await?;
    assert!(authed.status().is_success());

    Ok(())
}

#[tokio::test]
async fn websocket_stream_delivers_capture_events() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), COMPLETE_IMMEDIATELY)?;

    let process = WardenBuilder::new("stream events")?
        .duration("0:20")
        .agent_command(&agent)
        .with_dashboard()?
        .spawn()?;

    process.wait_healthy(Duration::from_secs(10)).await?;

    let (ws_stream, _) = tokio_tungstenite::connect_async(process.ws_url()).await?;
    let (_, mut read) = ws_stream.split();

    let event = tokio::time::timeout(Duration::from_secs(15), read.next()).await;
    assert!(event.is_ok(), "expected at least one event on the websocket before timing out");
    let message = event.unwrap().expect("stream closed without yielding a message")?;
    assert!(message.is_text(), "expected a text frame, got {message:?}");

    Ok(())
}

#[tokio::test]
async fn health_port_serves_without_auth_when_dashboard_is_gated() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let agent = write_fake_agent(dir.path(), NEVER_COMPLETES)?;

    let process = WardenBuilder::new("health only")?
        .duration("0:10")
        .agent_command(&agent)
        .with_dashboard_password("shh")?
        .with_health()?
        .spawn()?;

    tokio::time::sleep(Duration::from_secs(2)).await;

    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/api/v1/health", process.health_url())).send().await?;
    assert!(resp.status().is_success());

    Ok(())
}

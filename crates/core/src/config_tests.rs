// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::{parse_duration, Config};

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
fn valid_config_minimal() -> anyhow::Result<()> {
    let config = parse(&["warden", "/p", "Do X"]);
    config.validate()?;
    assert_eq!(config.project_path.to_str(), Some("/p"));
    assert_eq!(config.prompt, "Do X");
    assert_eq!(config.duration, "0:30");
    Ok(())
}

#[test]
fn relative_project_path_rejected() {
    let config = parse(&["warden", "p", "Do X"]);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("absolute"));
}

#[test]
fn dashboard_port_without_password_or_public_rejected() {
    let config = parse(&["warden", "/p", "Do X", "--dashboard-port", "9000"]);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("dashboard-password"));
}

#[test]
fn dashboard_port_with_password_accepted() -> anyhow::Result<()> {
    let config = parse(&[
        "warden",
        "/p",
        "Do X",
        "--dashboard-port",
        "9000",
        "--dashboard-password",
        "secret",
    ]);
    config.validate()
}

#[test]
fn dashboard_port_with_public_flag_accepted() -> anyhow::Result<()> {
    let config =
        parse(&["warden", "/p", "Do X", "--dashboard-port", "9000", "--dashboard-public"]);
    config.validate()
}

#[yare::parameterized(
    half_hour = { "0:30", 1800 },
    two_minutes = { "0:02", 120 },
    zero = { "0:00", 0 },
    one_hour = { "1:00", 3600 },
)]
fn duration_parses(input: &str, expected_secs: u64) -> anyhow::Result<()> {
    assert_eq!(parse_duration(input)?.as_secs(), expected_secs);
    Ok(())
}

#[yare::parameterized(
    no_colon = { "30" },
    minutes_overflow = { "0:90" },
    non_numeric = { "a:bb" },
)]
fn duration_rejects(input: &str) {
    assert!(parse_duration(input).is_err());
}

#[test]
fn rpc_socket_default_path() {
    let config = parse(&["warden", "/p", "Do X"]);
    assert_eq!(config.rpc_socket_path(), std::path::Path::new("/p/.warden/warden.sock"));
}

#[test]
fn rpc_socket_override() {
    let config = parse(&["warden", "/p", "Do X", "--rpc-socket", "/tmp/custom.sock"]);
    assert_eq!(config.rpc_socket_path(), std::path::Path::new("/tmp/custom.sock"));
}

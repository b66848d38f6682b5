//! Integration tests for the `glowcast` binary.
//!
//! Argument parsing, config handling and request validation. Nothing here
//! talks to a real light: every `light` case is rejected before a device
//! is contacted.
#![allow(clippy::unwrap_used)]

use std::io::Write as _;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the binary with env isolation.
///
/// Clears every `GLOWCAST_*` variable the binary reads and points the
/// config directories at a nonexistent path.
fn glowcast_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("glowcast");
    cmd.env("HOME", "/tmp/glowcast-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/glowcast-cli-test-nonexistent")
        .env_remove("GLOWCAST_CONFIG")
        .env_remove("GLOWCAST_PUBSUB_TOKEN")
        .env_remove("GLOWCAST_DONATION_JWT")
        .env_remove("GLOWCAST_LEDGER_SECRET")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_usage() {
    let output = glowcast_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    glowcast_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("light"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    glowcast_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("glowcast"));
}

#[test]
fn test_unknown_subcommand() {
    glowcast_cmd().arg("dance").assert().code(2);
}

// ── Light requests ──────────────────────────────────────────────────

#[test]
fn test_light_requires_a_request() {
    glowcast_cmd().arg("light").assert().code(2);
}

#[test]
fn test_light_unknown_scene_is_usage_error() {
    glowcast_cmd()
        .args(["light", "mauve"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("mauve"));
}

#[test]
fn test_light_brightness_out_of_range() {
    glowcast_cmd()
        .args(["light", "brightness=150"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("brightness"));
}

#[test]
fn test_light_temperature_must_be_a_number() {
    glowcast_cmd()
        .args(["light", "temperature=warm"])
        .assert()
        .code(2);
}

#[test]
fn test_light_bang_form_needs_redeemable_scene() {
    glowcast_cmd().args(["light", "!mauve"]).assert().code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    glowcast_cmd()
        .args(["config", "path", "--config", "/tmp/somewhere/glowcast.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/glowcast.toml"));
}

#[test]
fn test_config_path_honors_env() {
    glowcast_cmd()
        .env("GLOWCAST_CONFIG", "/tmp/from-env/glowcast.toml")
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/from-env/glowcast.toml"));
}

#[test]
fn test_config_show_defaults() {
    glowcast_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[strip]")
                .and(predicate::str::contains("10.0.0.21:5577"))
                .and(predicate::str::contains("[effects]")),
        );
}

#[test]
fn test_config_show_masks_secrets() {
    let file = config_file(
        r#"
[ledger]
url = "https://prizes.example/api/"
secret = "hunter2-ledger"
"#,
    );
    glowcast_cmd()
        .args(["config", "show", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("********")
                .and(predicate::str::contains("hunter2-ledger").not()),
        );
}

#[test]
fn test_malformed_config_is_config_error() {
    let file = config_file("[effects]\nstrobe_ms = \"fast\"\n");
    glowcast_cmd()
        .args(["config", "show", "--config"])
        .arg(file.path())
        .assert()
        .code(3);
}

#[test]
fn test_bad_initial_scene_fails_light_with_config_error() {
    let file = config_file("[effects]\ninitial_scene = \"mauve\"\n");
    glowcast_cmd()
        .args(["light", "blue", "--config"])
        .arg(file.path())
        .assert()
        .code(3);
}

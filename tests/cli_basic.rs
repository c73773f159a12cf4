//! Integration tests for basic CLI behavior.
//!
//! Covers standard flags, subcommand help, and input errors that must be
//! reported before any network access.

#![allow(deprecated)] // cargo_bin deprecation — replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the `vodrecover` binary with an empty config dir.
fn vodrecover(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vodrecover").expect("binary 'vodrecover' should be built");
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn home() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    vodrecover(&home())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: vodrecover"))
        .stdout(predicate::str::contains("recover"))
        .stdout(predicate::str::contains("tracker"))
        .stdout(predicate::str::contains("clips"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("direct"))
        .stdout(predicate::str::contains("--best"));
}

#[test]
fn version_flag_shows_semver() {
    vodrecover(&home())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^vodrecover \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    vodrecover(&home())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: vodrecover"));
}

#[test]
fn invalid_subcommand_fails() {
    vodrecover(&home())
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn recover_help() {
    vodrecover(&home())
        .args(["recover", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<CHANNEL>"))
        .stdout(predicate::str::contains("<BROADCAST_ID>"))
        .stdout(predicate::str::contains("<TIMESTAMP>"));
}

#[test]
fn clips_help_lists_formats() {
    vodrecover(&home())
        .args(["clips", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--minutes"))
        .stdout(predicate::str::contains("alternate"));
}

// ─── Usage errors ────────────────────────────────────────────────────────────

#[test]
fn recover_missing_args_fails() {
    vodrecover(&home())
        .args(["recover", "shroud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn recover_rejects_bad_timestamp() {
    vodrecover(&home())
        .args(["recover", "shroud", "50123456789", "01/01/2024 00:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timestamp"));
}

#[test]
fn tracker_rejects_unknown_site() {
    vodrecover(&home())
        .args(["tracker", "https://example.com/shroud/streams/1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized tracker URL"));
}

#[test]
fn direct_rejects_non_video_url() {
    vodrecover(&home())
        .args(["direct", "https://example.com/videos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a Twitch video URL"));
}

#[test]
fn validate_rejects_non_playlist_url() {
    vodrecover(&home())
        .args(["validate", "https://example.com/index.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a playlist URL"));
}

#[test]
fn clips_needs_url_or_id() {
    vodrecover(&home())
        .arg("clips")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--id"));
}

#[test]
fn clips_rejects_unknown_format() {
    vodrecover(&home())
        .args(["clips", "--id", "1", "--minutes", "1", "--format", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown clip format"));
}

#[test]
fn quality_must_be_positive() {
    vodrecover(&home())
        .args(["--quality", "0", "validate", "https://host/index-dvr.m3u8"])
        .assert()
        .failure();
}

#[test]
fn best_conflicts_with_quality() {
    vodrecover(&home())
        .args(["--best", "--quality", "2", "validate", "https://host/index-dvr.m3u8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
#[cfg(target_os = "linux")]
fn invalid_config_is_reported() {
    let home = home();
    let dir = home.path().join("vodrecover");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "drift_seconds = \"sixty\"").unwrap();

    vodrecover(&home)
        .args(["recover", "shroud", "50123456789", "2024-01-01 00:00:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}

//! End-to-end CLI tests against the simulation backend.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn gantry() -> Command {
    Command::cargo_bin("gantry").expect("gantry binary")
}

#[test]
fn no_arguments_prints_usage() {
    gantry()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn self_check_against_sim_prints_ok() {
    gantry()
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn self_check_with_explicit_config_and_json_logging() {
    let mut cfg = tempfile::NamedTempFile::new().expect("temp config");
    cfg.write_all(
        br#"
        [sensor]
        samples_per_reading = 4

        [logging]
        level = "info"
        "#,
    )
    .expect("write config");

    gantry()
        .args(["--config", &cfg.path().to_string_lossy(), "--json", "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn missing_config_file_is_a_humanized_error() {
    gantry()
        .args(["--config", "/nonexistent/gantry.toml", "self-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("How to fix"));
}

#[test]
fn invalid_config_exits_with_code_two() {
    let mut cfg = tempfile::NamedTempFile::new().expect("temp config");
    cfg.write_all(
        br#"
        [sensor]
        samples_per_reading = 0
        "#,
    )
    .expect("write config");

    gantry()
        .args(["--config", &cfg.path().to_string_lossy(), "self-check"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn heat_for_one_second_reports_a_temperature() {
    gantry()
        .args(["heat", "--setpoint", "200", "--for-seconds", "1"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("temperature after")
                .or(predicate::str::contains("at target")),
        );
}

#[test]
fn run_consumes_stdin_commands_and_exits_on_eof() {
    gantry()
        .arg("run")
        .write_stdin("G1 X10\n$sys\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok>"));
}

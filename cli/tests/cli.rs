#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn hostfix() -> Command {
    Command::cargo_bin("hostfix").unwrap()
}

#[test]
fn help_lists_every_flag() {
    hostfix()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--config")
                .and(predicate::str::contains("--skip-backup"))
                .and(predicate::str::contains("--backup-dir"))
                .and(predicate::str::contains("--log-file"))
                .and(predicate::str::contains("--step-timeout")),
        );
}

#[test]
fn version_prints_package_version() {
    hostfix()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_flag_is_rejected_before_any_work() {
    hostfix()
        .arg("--rollback")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rollback"));
}

#[test]
fn zero_step_timeout_is_rejected() {
    hostfix()
        .args(["--step-timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step-timeout"));
}

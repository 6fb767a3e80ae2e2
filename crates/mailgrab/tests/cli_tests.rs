//! Runs the `mailgrab` binary end to end.

use std::process::Command;

use assert_fs::prelude::*;

#[test]
fn test_failed_run_reports_error_once() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config_file = temp.child("config.yaml");
    config_file
        .write_str(&format!(
            "input:\n  dir: {}\n  imap:\n    server: 127.0.0.1:1\n    username: u\n    passwordEnvVar: MAILGRAB_CLI_TEST_UNSET\n",
            temp.child("reports").path().display()
        ))
        .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mailgrab"))
        .arg("--config")
        .arg(config_file.path())
        .env_remove("MAILGRAB_CLI_TEST_UNSET")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("Credentials not found").count(),
        1,
        "stderr was:\n{}",
        stderr
    );
}

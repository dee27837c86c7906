//! CLI smoke tests - verify basic command-line interface functionality
//!
//! These tests run the actual compiled binary to ensure:
//! - Help and version flags work
//! - Commands parse correctly
//! - Config errors are reported without touching the system bus

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Helper to get the path to the compiled btsw binary
fn btsw_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_btsw"))
}

#[test]
fn cli_help_works() {
    let output = btsw_bin()
        .arg("--help")
        .output()
        .expect("Failed to run btsw --help");

    assert!(output.status.success(), "btsw --help should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Help should show usage");
    assert!(stdout.contains("daemon"), "Help should list daemon command");
    assert!(stdout.contains("validate"), "Help should list validate command");
    assert!(stdout.contains("list-sinks"), "Help should list list-sinks command");
    assert!(stdout.contains("switch"), "Help should list switch command");
}

#[test]
fn cli_version_works() {
    let output = btsw_bin()
        .arg("--version")
        .output()
        .expect("Failed to run btsw --version");

    assert!(output.status.success(), "btsw --version should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("btsw"), "Version should mention btsw");
    assert!(
        stdout.split_whitespace().count() >= 2,
        "Version should show name and version number"
    );
}

#[test]
fn cli_validate_prints_summary() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[sinks]
fallback = "alsa_output.pci-0000_00_1f.3.analog-stereo"

[[devices]]
address = "C8:7B:23:5C:7C:27"
desc = "Headphones"
"#,
    )
    .expect("Failed to write config");

    let output = btsw_bin()
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("Failed to run btsw validate");

    assert!(output.status.success(), "validate should accept a valid config");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration valid"));
    assert!(stdout.contains("Headphones"));
    assert!(stdout.contains("bluez_output.C8_7B_23_5C_7C_27"));
    assert!(stdout.contains("prefix: bluez_output."));
    assert!(stdout.contains("address_style: underscore"));
}

#[test]
fn cli_daemon_logs_config_warnings() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp.path().join("config.toml");
    // The duplicate makes loading fail after the address warning, so the
    // daemon exits before touching pactl or the system bus
    fs::write(
        &config_path,
        r#"
[sinks]
fallback = "x"

[[devices]]
address = "AA:AA"

[[devices]]
address = "AA:AA"
"#,
    )
    .expect("Failed to write config");

    let output = btsw_bin()
        .arg("daemon")
        .arg("--config")
        .arg(&config_path)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run btsw daemon");

    assert!(!output.status.success(), "daemon should reject a duplicate address");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stdout.contains("does not look like") || stderr.contains("does not look like"),
        "Address warning should be logged in daemon mode: {stdout}{stderr}"
    );
    assert!(stderr.contains("Duplicate device address"), "{stderr}");
}

#[test]
fn cli_validate_reports_invalid_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, "[sinks]\nfallback = \"x\"\n").expect("Failed to write config");

    let output = btsw_bin()
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("Failed to run btsw validate");

    assert!(!output.status.success(), "validate should reject a config without devices");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No devices"), "Error should explain the problem: {stderr}");
}

#[test]
fn cli_invalid_command_shows_error() {
    let output = btsw_bin()
        .arg("nonexistent-command")
        .output()
        .expect("Failed to run btsw with invalid command");

    assert!(
        !output.status.success(),
        "Invalid command should fail with non-zero exit"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unrecognized")
            || stderr.contains("unexpected")
            || stderr.contains("error"),
        "Should show error for invalid command"
    );
}

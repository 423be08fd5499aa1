//! Integration tests for the `nicsync` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! state/fact file handling, and exit codes, using temporary files only.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `nicsync` binary with env isolation.
///
/// Clears `NICSYNC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn nicsync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("nicsync");
    cmd.env("HOME", "/tmp/nicsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/nicsync-cli-test-nonexistent")
        .env_remove("NICSYNC_CONFIG")
        .env_remove("NICSYNC_OUTPUT")
        .env_remove("NICSYNC_DEFAULTS__OUTPUT")
        .env_remove("NICSYNC_DEFAULTS__COLOR")
        .env_remove("NICSYNC_RECONCILE__IGNORED_IDENTIFIERS")
        .env_remove("NICSYNC_RECONCILE__IGNORE_FACTS_FOR_PROVISIONING")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn reconcile(state: &Path, facts: &Path) -> assert_cmd::Command {
    let mut cmd = nicsync_cmd();
    cmd.arg("reconcile")
        .arg("--state")
        .arg(state)
        .arg("--facts")
        .arg(facts);
    cmd
}

fn host_facts() -> Value {
    json!({
        "interfaces": {
            "eth0": { "mac": "00:00:00:11:22:33", "ip": "10.0.0.5" },
            "eth0.10": { "mac": "00:00:00:11:22:33", "virtual": true, "attached_to": "eth0" }
        },
        "ipmi": { "mac": "00:00:00:11:33:55", "ip": "192.168.0.9" }
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = nicsync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    nicsync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Usage")
            .and(predicate::str::contains("reconcile"))
            .and(predicate::str::contains("interfaces"))
            .and(predicate::str::contains("facts")),
    );
}

#[test]
fn test_version_flag() {
    nicsync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nicsync"));
}

#[test]
fn test_reconcile_help_lists_flags() {
    nicsync_cmd()
        .args(["reconcile", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--state")
                .and(predicate::str::contains("--facts"))
                .and(predicate::str::contains("--write"))
                .and(predicate::str::contains("--protect-provisioning")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    nicsync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    nicsync_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    nicsync_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Reconcile ───────────────────────────────────────────────────────

#[test]
fn test_reconcile_previews_without_writing() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "facts.json", &host_facts());
    let state = dir.path().join("host.json");

    let output = reconcile(&state, &facts).args(["-o", "json"]).output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let result = stdout_json(&output);
    assert_eq!(result["changes"].as_array().unwrap().len(), 3);
    assert!(result["primary"].is_u64());
    assert!(!state.exists(), "preview must not create the state file");
    assert!(String::from_utf8_lossy(&output.stderr).contains("--write"));
}

#[test]
fn test_reconcile_write_then_rerun_is_noop() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "facts.json", &host_facts());
    let state = dir.path().join("host.json");

    reconcile(&state, &facts).args(["--write", "--color", "never"]).assert().success();
    assert!(state.exists());

    reconcile(&state, &facts)
        .args(["--write", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes."));
}

#[test]
fn test_reconcile_plain_output_lists_actions() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "facts.json", &host_facts());
    let state = dir.path().join("host.json");

    let output = reconcile(&state, &facts).args(["-o", "plain"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.lines().all(|l| l.ends_with("created")), "{stdout}");
}

#[test]
fn test_reconcile_rename_carries_alias() {
    let dir = TempDir::new().unwrap();
    let state = write_json(
        &dir,
        "host.json",
        &json!({ "interfaces": [
            { "id": 1, "identifier": "eth4", "mac": "00:00:00:11:22:33", "ip": "10.10.0.1",
              "type": "physical", "primary": true, "provision": true },
            { "id": 2, "identifier": "eth4.1", "mac": "00:00:00:11:22:33", "ip": "10.10.0.2",
              "type": "virtual", "virtual": true, "attached_to": "eth4" }
        ]}),
    );
    let facts = write_json(
        &dir,
        "facts.json",
        &json!({ "interfaces": { "eth5": { "mac": "00:00:00:11:22:33", "ip": "10.10.0.1" } } }),
    );

    reconcile(&state, &facts).args(["--write", "-q"]).assert().success();

    let output = nicsync_cmd()
        .args(["interfaces", "show", "eth5.1", "-o", "json", "--state"])
        .arg(&state)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let alias = stdout_json(&output);
    assert_eq!(alias["id"], 2);
    assert_eq!(alias["attached_to"], "eth5");
    assert_eq!(alias["ip"], "10.10.0.2");
}

#[test]
fn test_reconcile_flat_agent_payload() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(
        &dir,
        "agent.json",
        &json!({
            "interfaces": "eth0,eth0_1,lo",
            "ipaddress": "10.0.0.5",
            "macaddress_eth0": "00:00:00:11:22:33",
            "ipaddress_eth0": "10.0.0.5",
            "macaddress_eth0_1": "00:00:00:11:22:33",
            "ipaddress_eth0_1": "10.0.0.6",
            "macaddress_lo": "00:00:00:00:00:00"
        }),
    );
    let state = dir.path().join("host.json");

    let output = reconcile(&state, &facts)
        .args(["--flat", "--write", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(stdout_json(&output)["skipped"], json!(["lo"]));

    nicsync_cmd()
        .args(["interfaces", "list", "-o", "plain", "--state"])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("eth0\neth0_1"));
}

#[test]
fn test_reconcile_reports_rejected_facts() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(
        &dir,
        "facts.json",
        &json!({ "interfaces": {
            "eth0": { "mac": "00:00:00:11:22:33" },
            "eth1": { "mac": "not-a-mac" }
        }}),
    );
    let state = dir.path().join("host.json");

    reconcile(&state, &facts)
        .args(["--color", "never"])
        .assert()
        .success()
        .stderr(predicate::str::contains("rejected fact 'eth1' (mac)"));
}

#[test]
fn test_reconcile_ignore_flag_skips_interface() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(
        &dir,
        "facts.json",
        &json!({ "interfaces": {
            "eth0": { "mac": "00:00:00:11:22:33" },
            "virbr0": { "mac": "52:54:00:00:00:01" }
        }}),
    );
    let state = dir.path().join("host.json");

    let output = reconcile(&state, &facts)
        .args(["--ignore", "virbr*", "-o", "json"])
        .output()
        .unwrap();
    assert_eq!(stdout_json(&output)["skipped"], json!(["virbr0"]));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = nicsync_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_missing_fact_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let output = reconcile(&dir.path().join("host.json"), &dir.path().join("absent.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("fact file"));
}

#[test]
fn test_malformed_facts_exit_usage() {
    let dir = TempDir::new().unwrap();
    let facts = dir.path().join("facts.json");
    std::fs::write(&facts, "{ not json").unwrap();

    let output = reconcile(&dir.path().join("host.json"), &facts).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Malformed facts"));
}

#[test]
fn test_flat_payload_must_be_object() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "agent.json", &json!(["eth0"]));

    let output = reconcile(&dir.path().join("host.json"), &facts)
        .arg("--flat")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_empty_ignore_pattern_is_rejected() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "facts.json", &host_facts());

    let output = reconcile(&dir.path().join("host.json"), &facts)
        .args(["--ignore", ""])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_interfaces_list_missing_state() {
    let dir = TempDir::new().unwrap();
    let output = nicsync_cmd()
        .args(["interfaces", "list", "--state"])
        .arg(dir.path().join("absent.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("state file"));
}

#[test]
fn test_interfaces_show_unknown() {
    let dir = TempDir::new().unwrap();
    let state = write_json(
        &dir,
        "host.json",
        &json!({ "interfaces": [{ "id": 1, "identifier": "eth0" }] }),
    );
    nicsync_cmd()
        .args(["interfaces", "show", "eth9", "--state"])
        .arg(&state)
        .assert()
        .code(4);
}

// ── Facts ───────────────────────────────────────────────────────────

#[test]
fn test_facts_parse_normalizes() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(
        &dir,
        "facts.json",
        &json!({ "interfaces": {
            "bond0": { "mac": "00:00:00:11:22:33", "virtual": true },
            "eth0": { "macaddress": "00-00-00-11-22-44", "ipaddress6": "2001:db8::5/64" }
        }}),
    );

    let output = nicsync_cmd()
        .args(["facts", "parse", "-o", "json"])
        .arg(&facts)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed = stdout_json(&output);
    assert_eq!(parsed["interfaces"][0]["type"], "bond");
    assert_eq!(parsed["interfaces"][1]["mac"], "00:00:00:11:22:44");
    assert_eq!(parsed["interfaces"][1]["ip6"], "2001:db8::5");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    nicsync_cmd()
        .args(["config", "path", "--config", "/tmp/elsewhere/nicsync.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/nicsync.toml"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    nicsync_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("[reconcile]"));

    nicsync_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .code(2);

    nicsync_cmd()
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_default_output_applies() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[defaults]\noutput = \"json\"\n").unwrap();
    let state = write_json(
        &dir,
        "host.json",
        &json!({ "interfaces": [{ "id": 1, "identifier": "eth0" }] }),
    );

    let output = nicsync_cmd()
        .args(["interfaces", "list", "--config"])
        .arg(&config)
        .arg("--state")
        .arg(&state)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(stdout_json(&output)[0]["identifier"], "eth0");
}

#[test]
fn test_config_protection_leaves_primary_alone() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[reconcile]\nignore_facts_for_provisioning = true\n").unwrap();
    let state = write_json(
        &dir,
        "host.json",
        &json!({ "interfaces": [
            { "id": 1, "identifier": "eth0", "mac": "00:00:00:11:22:33", "ip": "10.0.0.1",
              "primary": true, "provision": true }
        ]}),
    );
    let facts = write_json(
        &dir,
        "facts.json",
        &json!({ "interfaces": { "eth0": { "mac": "00:00:00:11:22:33", "ip": "10.0.0.99" } } }),
    );

    let output = reconcile(&state, &facts)
        .arg("--config")
        .arg(&config)
        .args(["-o", "json"])
        .output()
        .unwrap();
    let result = stdout_json(&output);
    assert_eq!(result["skipped"], json!(["eth0"]));
    assert_eq!(result["changes"], json!([]));
}

#[test]
fn test_missing_explicit_config_is_not_found() {
    let dir = TempDir::new().unwrap();
    let facts = write_json(&dir, "facts.json", &host_facts());
    let output = reconcile(&dir.path().join("host.json"), &facts)
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

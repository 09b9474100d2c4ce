#![allow(deprecated)] // TODO: move from Command::cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

/// Command isolated from the developer's own configuration and credentials
fn armada(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("ARMADA_CONFIG_PATH")
        .env_remove("AZURE_SUBSCRIPTION_ID")
        .env_remove("AZURE_ACCESS_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

const CONFIG: &str = r#"
subscription_id: "00000000-0000-0000-0000-000000000000"

resources:
  web_set:
    type: azure_availability_set
    name: web-set
    resource_group_name: rg1
    location: West Europe
"#;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("destroy"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("armada"));
}

#[test]
fn test_types_lists_every_kind() {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("azure_availability_set"))
        .stdout(predicate::str::contains("azure_shared_image_version"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--no-refresh"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("armada").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_plan_without_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    armada(temp_dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_plan_without_token() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("armada.yaml"), CONFIG).unwrap();

    armada(temp_dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AZURE_ACCESS_TOKEN"));
}

#[test]
fn test_plan_without_subscription() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("armada.yaml"), "resources: {}\n").unwrap();

    armada(temp_dir.path())
        .env("AZURE_ACCESS_TOKEN", "token")
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No subscription configured"));
}

#[test]
fn test_show_empty_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("armada.yaml"), CONFIG).unwrap();

    armada(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tracked resources"));

    armada(temp_dir.path())
        .args(["show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("{}"));
}

#[test]
fn test_show_reads_state_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("armada.yaml"), CONFIG).unwrap();
    fs::create_dir(temp_dir.path().join(".armada")).unwrap();
    fs::write(
        temp_dir.path().join(".armada").join("state.json"),
        r#"{
  "version": 1,
  "updated_at": "2026-01-01T00:00:00Z",
  "resources": {
    "web_set": {
      "id": "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Compute/availabilitySets/web-set",
      "kind": "azure_availability_set",
      "status": "present",
      "attributes": {"platform_fault_domain_count": 3},
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    }
  }
}"#,
    )
    .unwrap();

    armada(temp_dir.path())
        .args(["show", "web_set"])
        .assert()
        .success()
        .stdout(predicate::str::contains("availabilitySets/web-set"))
        .stdout(predicate::str::contains("platform_fault_domain_count = 3"));

    armada(temp_dir.path())
        .args(["show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not tracked"));
}

#[test]
fn test_explicit_config_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("custom.yaml");
    fs::write(&config_path, "resources: [broken").unwrap();

    armada(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("custom.yaml"));
}

#[test]
fn test_import_requires_type_for_undeclared_resource() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("armada.yaml"), CONFIG).unwrap();

    armada(temp_dir.path())
        .args([
            "import",
            "other",
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Compute/availabilitySets/other",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--type"));
}

#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn inkcycle(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("inkcycle").unwrap();
    cmd.current_dir(dir.path())
        .env("INKCYCLE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_frame(dir: &TempDir) {
    inkcycle(dir).args(["init", "--name", "hall"]).assert().success();
}

fn device_yaml(dir: &TempDir) -> serde_yaml::Value {
    let raw = std::fs::read_to_string(dir.path().join(".inkcycle/device.yaml")).unwrap();
    serde_yaml::from_str(&raw).unwrap()
}

// ---------------------------------------------------------------------------
// inkcycle init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_starter_config() {
    let dir = TempDir::new().unwrap();
    inkcycle(&dir)
        .args(["init", "--name", "hall"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .inkcycle/device.yaml"));

    let yaml = device_yaml(&dir);
    assert_eq!(yaml["name"], "hall");
    assert_eq!(yaml["playlist_config"]["playlists"][0]["name"], "Default");
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
    assert_eq!(device_yaml(&dir)["name"], "hall");
}

// ---------------------------------------------------------------------------
// inkcycle config
// ---------------------------------------------------------------------------

#[test]
fn validate_starter_config_is_clean() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn validate_bad_timezone_fails() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    let path = dir.path().join(".inkcycle/device.yaml");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("timezone: UTC", "timezone: Mars/Olympus")).unwrap();

    inkcycle(&dir)
        .args(["config", "validate", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Mars/Olympus"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_without_init_reports_hint() {
    let dir = TempDir::new().unwrap();
    inkcycle(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("inkcycle init"));
}

// ---------------------------------------------------------------------------
// inkcycle playlist
// ---------------------------------------------------------------------------

#[test]
fn playlist_list_json() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    let output = inkcycle(&dir)
        .args(["playlist", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["name"], "Default");
    assert_eq!(json[0]["start_time"], "00:00");
    assert_eq!(json[0]["end_time"], "24:00");
}

#[test]
fn playlist_lifecycle_and_active_lookup() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args(["playlist", "delete", "Default"])
        .assert()
        .success();
    inkcycle(&dir)
        .args(["playlist", "add", "Night", "--start", "22:00", "--end", "06:00"])
        .assert()
        .success();
    inkcycle(&dir)
        .args([
            "playlist",
            "add-instance",
            "Night",
            "--plugin",
            "blank",
            "--name",
            "dark",
            "--setting",
            "color=#000000",
        ])
        .assert()
        .success();

    inkcycle(&dir)
        .args(["playlist", "active", "--at", "23:30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Night (22:00-06:00)"))
        .stdout(predicate::str::contains("next: dark (blank)"));
    inkcycle(&dir)
        .args(["playlist", "active", "--at", "03:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Night"));
    inkcycle(&dir)
        .args(["playlist", "active", "--at", "12:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active playlist"));

    let yaml = device_yaml(&dir);
    let night = &yaml["playlist_config"]["playlists"][0];
    assert_eq!(night["plugins"][0]["settings"]["color"], "#000000");
}

#[test]
fn add_instance_rejects_unregistered_plugin() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args([
            "playlist",
            "add-instance",
            "Default",
            "--plugin",
            "weather",
            "--name",
            "w",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("weather"));
}

#[test]
fn duplicate_playlist_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args(["playlist", "add", "Default", "--start", "01:00", "--end", "02:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn active_rejects_malformed_time() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args(["playlist", "active", "--at", "25:99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time"));
}

#[test]
fn active_json_reports_next_instance() {
    let dir = TempDir::new().unwrap();
    init_frame(&dir);
    inkcycle(&dir)
        .args(["-j", "playlist", "active", "--at", "08:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active\": \"Default\""))
        .stdout(predicate::str::contains("\"next_instance\": \"white\""));
}

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_pathmod(dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pathmod"));
    cmd.current_dir(dir)
        .arg("--config")
        .arg(dir.join("absent.json"))
        .args(args);
    cmd.output().expect("run pathmod")
}

fn game_dir() -> TempDir {
    let tmp = TempDir::new().expect("tmpdir");
    fs::create_dir_all(tmp.path().join("resources")).unwrap();
    fs::write(tmp.path().join("resources/app.asar"), "packed game sources").unwrap();
    tmp
}

#[test]
fn features_lists_every_group() {
    let tmp = TempDir::new().unwrap();
    let out = run_pathmod(tmp.path(), &["features"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for key in ["pause_micro", "endless", "hidden_items", "egg_shop"] {
        assert!(stdout.contains(key), "missing {key} in:\n{stdout}");
    }
}

#[test]
fn features_json_is_machine_readable() {
    let tmp = TempDir::new().unwrap();
    let out = run_pathmod(tmp.path(), &["features", "--json"]);
    assert!(out.status.success());
    let parsed: Value = serde_json::from_slice(&out.stdout).expect("json output");
    let groups = parsed.as_array().unwrap();
    assert_eq!(groups.len(), 14);
    assert_eq!(groups[0]["key"], "pause_micro");
    assert_eq!(groups[0]["entries"][0], "pause_micromanagement");
}

#[test]
fn status_reports_untouched_game() {
    let tmp = game_dir();
    let root = tmp.path().to_str().unwrap();
    let out = run_pathmod(tmp.path(), &["--game-root", root, "status"]);
    assert!(
        out.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("backup:         no"));
    assert!(stdout.contains("app.asar:       original"));
}

#[test]
fn status_without_game_fails_cleanly() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("nowhere");
    let out = run_pathmod(tmp.path(), &["--game-root", root.to_str().unwrap(), "status"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Error: configuration error: resources folder not found"));
}

#[test]
fn restore_needs_a_backup() {
    let tmp = game_dir();
    let root = tmp.path().to_str().unwrap();
    let out = run_pathmod(tmp.path(), &["--game-root", root, "restore"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no pristine backup"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("resources/app.asar")).unwrap(),
        "packed game sources"
    );
}

#[test]
fn unknown_feature_is_rejected_before_touching_files() {
    let tmp = game_dir();
    let root = tmp.path().to_str().unwrap();
    let out = run_pathmod(
        tmp.path(),
        &["--game-root", root, "install", "--features", "warp_speed"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown feature 'warp_speed'"));
    assert!(!tmp.path().join("resources/app.asar.vanilla").exists());
}

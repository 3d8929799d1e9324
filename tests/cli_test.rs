use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn rigup(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rigup").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_STATE_HOME", temp.path().join("state"))
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_output() {
    let mut cmd = Command::cargo_bin("rigup").unwrap();
    cmd.arg("--help").assert().success();
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("rigup").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("fail-fast"));
}

#[test]
#[serial]
fn test_init_creates_template_manifest() {
    let temp = TempDir::new().unwrap();

    rigup(&temp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("rigup.toml"));

    let manifest = fs::read_to_string(temp.path().join("rigup.toml")).unwrap();
    assert!(manifest.contains("[toolkit]"));
    assert!(manifest.contains("version = \"3.10.15\""));
}

#[test]
#[serial]
fn test_init_refuses_to_overwrite_without_force() {
    let temp = TempDir::new().unwrap();

    rigup(&temp).arg("init").assert().success();

    rigup(&temp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    rigup(&temp).arg("init").arg("--force").assert().success();
}

#[test]
#[serial]
fn test_check_validates_template() {
    let temp = TempDir::new().unwrap();

    rigup(&temp).arg("init").assert().success();

    rigup(&temp)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
#[serial]
fn test_check_names_offending_field() {
    let temp = TempDir::new().unwrap();

    rigup(&temp).arg("init").assert().success();

    let path = temp.path().join("rigup.toml");
    let manifest = fs::read_to_string(&path).unwrap();
    fs::write(
        &path,
        manifest.replace("version = \"3.10.15\"", "version = \"3.10\""),
    )
    .unwrap();

    rigup(&temp)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interpreter.version"));
}

#[test]
#[serial]
fn test_check_without_manifest_suggests_init() {
    let temp = TempDir::new().unwrap();

    rigup(&temp)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rigup init"));
}

#[test]
#[serial]
fn test_env_prints_bash_exports() {
    let temp = TempDir::new().unwrap();

    rigup(&temp).arg("init").assert().success();

    rigup(&temp)
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "export PATH=\"/usr/local/cuda-12.4/bin:",
        ))
        .stdout(predicate::str::contains(
            "export LD_LIBRARY_PATH=\"/usr/local/cuda-12.4/lib64:",
        ));
}

#[test]
#[serial]
fn test_env_fish_uses_set_gx() {
    let temp = TempDir::new().unwrap();

    rigup(&temp).arg("init").assert().success();

    rigup(&temp)
        .arg("env")
        .arg("--shell")
        .arg("fish")
        .assert()
        .success()
        .stdout(predicate::str::contains("set -gx PATH"));
}

#[test]
#[serial]
fn test_plan_lists_pending_steps() {
    let temp = TempDir::new().unwrap();

    // os-release matching the template keeps the base step satisfied while
    // everything else stays pending on a bare machine.
    let os_release = temp.path().join("os-release");
    fs::write(&os_release, "ID=ubuntu\nVERSION_ID=\"22.04\"\n").unwrap();

    rigup(&temp).arg("init").assert().success();

    rigup(&temp)
        .env("RIGUP_OS_RELEASE", &os_release)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("toolkit"))
        .stdout(predicate::str::contains("pending"))
        .stdout(predicate::str::contains("rigup apply"));
}

#[test]
#[serial]
fn test_status_before_any_apply() {
    let temp = TempDir::new().unwrap();

    rigup(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing has been applied"));
}

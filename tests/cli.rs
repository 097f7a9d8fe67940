// ABOUTME: CLI smoke tests via the compiled binary.
// ABOUTME: Covers init scaffolding, provider gating, and a rehearsal run.

use assert_cmd::Command;
use predicates::prelude::*;

fn armada() -> Command {
    Command::cargo_bin("armada").expect("binary should build")
}

/// Test: help names the subcommands.
#[test]
fn help_lists_subcommands() {
    armada()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("init"));
}

/// Test: init scaffolds a manifest and refuses to clobber it.
#[test]
fn init_scaffolds_a_manifest() {
    let dir = tempfile::tempdir().unwrap();

    armada()
        .current_dir(dir.path())
        .args(["init", "--stack", "demo"])
        .assert()
        .success();
    assert!(dir.path().join("armada.yml").is_file());

    armada()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    armada()
        .current_dir(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

/// Test: deploy refuses to run without provider bindings unless rehearsing.
#[test]
fn deploy_requires_a_provider_or_rehearsal() {
    let dir = tempfile::tempdir().unwrap();
    armada()
        .current_dir(dir.path())
        .args(["init", "--stack", "demo"])
        .assert()
        .success();

    armada()
        .current_dir(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cloud provider bindings"));
}

/// Test: a rehearsal deploy runs the whole pipeline against the in-memory
/// provider and reports success.
#[test]
fn rehearsal_deploy_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    armada()
        .current_dir(dir.path())
        .args(["init", "--stack", "demo"])
        .assert()
        .success();

    armada()
        .current_dir(dir.path())
        .args([
            "deploy",
            "--rehearse",
            "--timeout",
            "60",
            "--polling-interval",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy complete!"));
}

/// Test: a failing pre-deploy callback aborts the run before the pipeline
/// touches a provider.
#[test]
fn failing_pre_deploy_callback_aborts() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    armada()
        .current_dir(dir.path())
        .args(["init", "--stack", "demo"])
        .assert()
        .success();

    let callbacks_dir = dir.path().join(".armada").join("callbacks");
    std::fs::create_dir_all(&callbacks_dir).unwrap();
    let script = callbacks_dir.join("pre-deploy");
    std::fs::write(&script, "#!/bin/sh\nexit 1\n").unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    armada()
        .current_dir(dir.path())
        .args(["deploy", "--rehearse"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pre-deploy callback failed"));
}

/// Test: unknown stack filters fail before anything runs.
#[test]
fn unknown_stack_filter_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    armada()
        .current_dir(dir.path())
        .args(["init", "--stack", "demo"])
        .assert()
        .success();

    armada()
        .current_dir(dir.path())
        .args(["deploy", "--rehearse", "--stack", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stack"));
}

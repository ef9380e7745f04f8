//! CLI integration tests: exercise the compiled `frepo` binary end to end
//! against real, local (`file://`) git remotes.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use common::git_helpers;

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("frepo").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-repo workspace orchestrator"));
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("frepo").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_sync_outside_workspace_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("frepo").unwrap();
    cmd.current_dir(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no workspace found"));
}

/// Sets up two bare remotes (a manifest repo and a project repo) under
/// `root`, returns their `file://` URLs.
fn setup_remotes(root: &std::path::Path) -> (String, String) {
    let manifest_bare = root.join("remotes/manifest.git");
    let project_bare = root.join("remotes/foo.git");
    git_helpers::init_bare_repo(&manifest_bare);
    git_helpers::init_bare_repo(&project_bare);

    let project_url = format!("file://{}", project_bare.display());

    let project_work = root.join("scratch/foo");
    git_helpers::clone_repo(&format!("file://{}", project_bare.display()), &project_work);
    git_helpers::commit_file(&project_work, "hello.txt", "hello from foo\n", "initial");
    git_helpers::push_branch(&project_work, "origin", "main");

    let manifest_work = root.join("scratch/manifest");
    git_helpers::clone_repo(&format!("file://{}", manifest_bare.display()), &manifest_work);
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="origin" fetch="{project_url}" />
  <project path="libs/foo" name="foo" revision="main" />
</manifest>
"#
    );
    git_helpers::commit_file(&manifest_work, "default.xml", &xml, "initial manifest");
    git_helpers::push_branch(&manifest_work, "origin", "main");

    (format!("file://{}", manifest_bare.display()), project_url)
}

#[test]
fn test_init_sync_list_forall_snapshot_workflow() {
    let temp = TempDir::new().unwrap();
    let (manifest_url, _project_url) = setup_remotes(temp.path());
    let workspace = temp.path().join("workspace");

    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(temp.path())
        .args(["init", "workspace", "-u", &manifest_url, "-b", "main"])
        .assert()
        .success();

    assert!(workspace.join(".frepo/config.ini").exists());
    assert!(workspace.join(".frepo/manifest.xml").exists());
    let checked_out = workspace.join("libs/foo/hello.txt");
    assert!(checked_out.exists(), "project was not cloned into the workspace");
    assert_eq!(
        std::fs::read_to_string(&checked_out).unwrap(),
        "hello from foo\n"
    );

    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(&workspace)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("libs/foo"));

    let marker = workspace.join("forall-output.txt");
    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(&workspace)
        .args([
            "forall",
            "-c",
            "sh",
            "-c",
            &format!("echo $REPO_PROJECT >> {}", marker.display()),
        ])
        .assert()
        .success();
    let forall_output = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(forall_output.trim(), "foo");

    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(&workspace)
        .args(["snapshot", "release-1"])
        .assert()
        .success();
    // The snapshot is written to the canonical manifest filename on the
    // new branch, not a name-derived file, so a later `sync -b release-1`
    // reads the pinned content.
    let pinned = std::process::Command::new("git")
        .current_dir(workspace.join("manifest"))
        .args(["show", "release-1:default.xml"])
        .output()
        .unwrap();
    assert!(pinned.status.success());
    let pinned_xml = String::from_utf8(pinned.stdout).unwrap();
    assert!(pinned_xml.contains("path=\"libs/foo\""));
    assert!(!pinned_xml.contains("revision=\"main\""));

    // A second sync against an unchanged manifest should be a clean no-op.
    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(&workspace)
        .arg("sync")
        .assert()
        .success();
}

#[test]
fn test_init_refuses_existing_directory() {
    let temp = TempDir::new().unwrap();
    let (manifest_url, _) = setup_remotes(temp.path());
    let workspace = temp.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    Command::cargo_bin("frepo")
        .unwrap()
        .current_dir(temp.path())
        .args(["init", "workspace", "-u", &manifest_url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;

use issuemirror_core::config;
use tempfile::TempDir;

fn issuemirror_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("issuemirror"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn init(home: &TempDir, vault: &Path) {
    issuemirror_cmd(home.path())
        .arg("init")
        .arg(vault)
        .assert()
        .success()
        .stdout(contains("Vault set to"));
}

#[test]
fn init_creates_config_and_vault() {
    let home = TempDir::new().expect("home");
    let vault = home.path().join("notes");
    init(&home, &vault);

    assert!(vault.is_dir(), "vault folder is created");
    let cfg = config::load_at(home.path()).expect("config written");
    assert_eq!(cfg.settings.vault_path, vault.canonicalize().unwrap());
    assert!(cfg.repositories.is_empty());

    issuemirror_cmd(home.path())
        .arg("init")
        .arg(&vault)
        .assert()
        .success()
        .stdout(contains("already exists"));
}

#[test]
fn commands_before_init_point_at_init() {
    let home = TempDir::new().expect("home");
    issuemirror_cmd(home.path())
        .args(["repo", "list"])
        .assert()
        .failure()
        .stderr(contains("issuemirror init"));
}

#[test]
fn repo_add_list_remove() {
    let home = TempDir::new().expect("home");
    init(&home, &home.path().join("vault"));

    issuemirror_cmd(home.path())
        .args(["repo", "add", "acme/widgets", "--pull-requests"])
        .assert()
        .success()
        .stdout(contains("Tracking 'acme/widgets'"));
    issuemirror_cmd(home.path())
        .args(["repo", "add", "acme/gadgets", "--folder", "Inbox"])
        .assert()
        .success();

    let assert = issuemirror_cmd(home.path())
        .args(["repo", "list"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.contains("acme/widgets"));
    assert!(stdout.contains("GitHub Pull Requests/acme/widgets"), "{stdout}");
    assert!(stdout.contains("Inbox"), "{stdout}");

    issuemirror_cmd(home.path())
        .args(["repo", "add", "ACME/Widgets"])
        .assert()
        .failure()
        .stderr(contains("already tracked"));

    issuemirror_cmd(home.path())
        .args(["repo", "remove", "acme/widgets"])
        .assert()
        .success();
    let cfg = config::load_at(home.path()).expect("config");
    let names: Vec<_> = cfg.repositories.iter().map(|r| r.repository.as_str()).collect();
    assert_eq!(names, vec!["acme/gadgets"]);
}

#[test]
fn invalid_repository_is_rejected() {
    let home = TempDir::new().expect("home");
    init(&home, &home.path().join("vault"));

    issuemirror_cmd(home.path())
        .args(["repo", "add", "not-a-repo"])
        .assert()
        .failure()
        .stderr(contains("owner/name"));
    issuemirror_cmd(home.path())
        .args(["repo", "add", "acme/widgets", "--no-issues"])
        .assert()
        .failure()
        .stderr(contains("nothing to track"));
    issuemirror_cmd(home.path())
        .args(["repo", "remove", "acme/unknown"])
        .assert()
        .failure()
        .stderr(contains("not tracked"));
}

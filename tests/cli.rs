//! Smoke tests for the command-line interface.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

fn pagesmith() -> Command {
    Command::cargo_bin("pagesmith").expect("pagesmith binary build failed")
}

#[test]
fn prints_usage_on_bad_command() {
    pagesmith()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(contains("invalid value"));
}

#[test]
fn builds_a_minimal_project() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/index.html"), "<p>hello</p>\n").unwrap();

    pagesmith()
        .args(["build", "--cwd", root.to_str().unwrap()])
        .assert()
        .success();

    assert!(root.join("dist/index.html").is_file());
}

#[test]
fn clean_succeeds_on_a_pristine_project() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();

    pagesmith()
        .args(["clean", "--cwd", root.to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn config_flag_points_at_an_alternate_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/index.html"), "<h1>{{ title }}</h1>\n").unwrap();
    fs::write(root.join("alt.toml"), "[data]\ntitle = \"Alt\"\n").unwrap();

    pagesmith()
        .args([
            "build",
            "--cwd",
            root.to_str().unwrap(),
            "--config",
            root.join("alt.toml").to_str().unwrap(),
        ])
        .assert()
        .success();

    let page = fs::read_to_string(root.join("dist/index.html")).unwrap();
    assert!(page.contains("Alt"));
}

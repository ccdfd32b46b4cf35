use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn paper(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("paper");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn minimal_project(root: &Path, meta: &str) {
    write(root, "paper_meta.yml", meta);
    write(root, "content/01_intro.md", "---\ntitle: x\n---\nOne two three.\n");
    write(root, "content/part/02_more.md", "Four five.\n");
    std::fs::create_dir_all(root.join(".paper_resources")).unwrap();
}

#[test]
fn version_flag() {
    let tmp = TempDir::new().unwrap();
    paper(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("paper "));
}

#[test]
fn every_command_has_help() {
    let tmp = TempDir::new().unwrap();
    for command in ["new", "init", "dev", "build", "fmt", "wc", "save", "push", "web"] {
        paper(tmp.path()).args([command, "--help"]).assert().success();
    }
}

#[test]
fn build_outside_project_exits_one() {
    let tmp = TempDir::new().unwrap();
    paper(tmp.path())
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not in a paper project directory"));
}

#[test]
fn invalid_default_format_exits_two() {
    let tmp = TempDir::new().unwrap();
    minimal_project(tmp.path(), "default_format: pdf\n");
    paper(tmp.path())
        .arg("build")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'pdf' is not one of"));
}

#[test]
fn unknown_format_flag_exits_two() {
    let tmp = TempDir::new().unwrap();
    minimal_project(tmp.path(), "data:\n  author: X\n");
    paper(tmp.path())
        .args(["build", "--format", "rtf"])
        .assert()
        .code(2);
}

#[test]
fn multiple_documents_exit_one() {
    let tmp = TempDir::new().unwrap();
    minimal_project(tmp.path(), "---\na: 1\n---\nb: 2\n");
    paper(tmp.path())
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Found more than one meta document"));
}

#[test]
fn new_rejects_nested_name() {
    let tmp = TempDir::new().unwrap();
    paper(tmp.path())
        .args(["new", "a/b"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid project name: 'a/b'"));
    assert!(!tmp.path().join("a").exists());
}

#[test]
fn init_requires_empty_directory() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "notes.txt", "x");
    paper(tmp.path())
        .arg("init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Directory needs to be empty"));
}

#[test]
fn wc_prints_table_with_total() {
    let tmp = TempDir::new().unwrap();
    minimal_project(tmp.path(), "data:\n  author: X\n");
    paper(tmp.path())
        .arg("wc")
        .assert()
        .success()
        .stdout(predicate::str::contains("`01_intro.md`"))
        .stdout(predicate::str::contains("`part/02_more.md`"))
        .stdout(predicate::str::is_match(r"\| \*\*TOTAL\*\* +\| 5 +\|").unwrap());
}

#[cfg(unix)]
#[test]
fn new_scaffolds_a_project_wc_can_read() {
    let tmp = TempDir::new().unwrap();
    paper(tmp.path())
        .args(["new", "essay"])
        .env("PAPER_GIT", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting new project called 'essay'..."));

    let project = tmp.path().join("essay");
    assert!(project.join("paper_meta.yml").is_file());
    assert!(project.join("research").is_dir());

    paper(&project)
        .arg("wc")
        .assert()
        .success()
        .stdout(predicate::str::contains("`01_main.md`"));
}

#[cfg(unix)]
#[test]
fn fmt_runs_converter_per_file() {
    let tmp = TempDir::new().unwrap();
    minimal_project(tmp.path(), "data:\n  author: X\n");
    paper(tmp.path())
        .args(["fmt", "--wrap", "false"])
        .env("PAPER_PANDOC", "true")
        .assert()
        .success();
}

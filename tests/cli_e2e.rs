//! End-to-end CLI tests for the acquirer binary.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary invocation isolated from the user's config and library.
fn acquirer(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("acquirer").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("HOME", home.path())
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    acquirer(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Acquire publications"));
}

#[test]
fn test_binary_without_command_is_usage_error() {
    let home = TempDir::new().unwrap();
    acquirer(&home).assert().code(2);
}

#[test]
fn test_import_then_list() {
    let home = TempDir::new().unwrap();
    let source = home.path().join("voyage.epub");
    std::fs::write(&source, support::epub_bytes()).unwrap();
    let library = home.path().join("books");

    acquirer(&home)
        .arg("import")
        .arg(&source)
        .arg("--library-dir")
        .arg(&library)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"success""#));

    assert!(library.join("catalog.db").exists());
    assert!(library.join("covers").join("1.png").exists());

    acquirer(&home)
        .args(["-q", "list", "--library-dir"])
        .arg(&library)
        .assert()
        .success()
        .stdout(predicate::str::contains(support::EPUB_TITLE))
        .stdout(predicate::str::contains(r#""extension":"epub""#));
}

#[test]
fn test_import_missing_file_reports_failure_payload() {
    let home = TempDir::new().unwrap();

    acquirer(&home)
        .arg("import")
        .arg(home.path().join("absent.epub"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            r#"{"status":"failure","data":{"error":"Unable to copy the publication"}}"#,
        ));
}

#[test]
fn test_run_rejects_malformed_payload() {
    let home = TempDir::new().unwrap();

    acquirer(&home)
        .args(["run", "-"])
        .write_stdin("this is not json")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid JSON input"));
}

#[test]
fn test_run_without_source_or_publication_fails() {
    let home = TempDir::new().unwrap();

    acquirer(&home)
        .args(["run", "-"])
        .write_stdin("{}")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#"{"status":"failure"}"#));
}

#[test]
fn test_config_library_dir_is_used() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("config").join("acquirer");
    std::fs::create_dir_all(&config_dir).unwrap();
    let library = home.path().join("from-config");
    std::fs::write(
        config_dir.join("config.toml"),
        format!("library_dir = \"{}\"\n", library.display()),
    )
    .unwrap();

    acquirer(&home).arg("list").assert().success();

    assert!(library.join("catalog.db").exists());
}

#[test]
fn test_invalid_config_is_usage_error() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "concurrency = 4\n").unwrap();

    acquirer(&home)
        .arg("list")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown configuration key"));
}

//! End-to-end tests for the `tml` launcher binary.
//!
//! Each test invokes the built binary and asserts on exit codes and
//! output. Commands that need absent plugins must fail with the stable
//! `L013` toolchain error rather than crash.

use std::path::PathBuf;
use std::process::Command;

/// Find the `tml` binary in the target directory.
fn find_tml() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("cannot find current exe")
        .parent()
        .expect("cannot find parent dir")
        .to_path_buf();
    if path.file_name().is_some_and(|n| n == "deps") {
        path = path.parent().expect("target profile dir").to_path_buf();
    }
    let tml = path.join(if cfg!(windows) { "tml.exe" } else { "tml" });
    assert!(
        tml.exists(),
        "tml binary not found at {}. Run `cargo build -p tmlc` first.",
        tml.display()
    );
    tml
}

fn run_tml(args: &[&str]) -> std::process::Output {
    Command::new(find_tml())
        .args(args)
        .env("TML_PLUGIN_DIR", "/nonexistent-plugin-dir")
        .output()
        .expect("failed to invoke tml")
}

#[test]
fn version_prints_without_plugins() {
    let output = run_tml(&["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("tml "), "unexpected output: {stdout}");
}

#[test]
fn help_lists_commands() {
    let output = run_tml(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["build", "check", "fmt", "explain", "mcp"] {
        assert!(stdout.contains(command), "help missing '{command}'");
    }
}

#[test]
fn no_arguments_shows_usage_and_succeeds() {
    let output = run_tml(&[]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage: tml"));
}

#[test]
fn explain_prints_the_catalog_paragraph() {
    let output = run_tml(&["explain", "T057"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("T057"));
    assert!(stdout.contains("expected"));
}

#[test]
fn explain_unknown_code_fails() {
    let output = run_tml(&["explain", "Z999"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Z999"));
}

#[test]
fn init_scaffolds_a_project() {
    let temp = tempfile::tempdir().expect("temp");
    let project = temp.path().join("hello");
    let output = run_tml(&["init", project.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(project.join("tml.toml").exists());
    assert!(project.join("src").join("main.tml").exists());
    let manifest = std::fs::read_to_string(project.join("tml.toml")).expect("read");
    assert!(manifest.contains("name = \"hello\""));
}

#[test]
fn fmt_without_tools_plugin_is_l013() {
    let output = run_tml(&["fmt", "whatever.tml"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("L013"), "unexpected stderr: {stderr}");
}

#[test]
fn build_without_front_end_reports_missing_capability() {
    let temp = tempfile::tempdir().expect("temp");
    let source = temp.path().join("main.tml");
    std::fs::write(&source, "func main() {}\n").expect("write");
    let output = run_tml(&["build", source.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("L013"), "unexpected stderr: {stderr}");
}

#[test]
fn build_of_missing_file_reports_path() {
    let output = run_tml(&["build", "/no/such/main.tml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

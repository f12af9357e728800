//! Integration tests for the CLI interface

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dynarun(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dynarun").unwrap();
    cmd.current_dir(temp.path())
        .env("DYNARUN_TEMP_DIR", temp.path())
        .env_remove("DYNARUN_INSTRUMENTER")
        .env_remove("DYNARUN_WORKERS");
    cmd
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("dynarun").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("instrument"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("dynarun").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_missing_ignore_file_exit_code() {
    let temp = TempDir::new().unwrap();
    dynarun(&temp)
        .args(["instrument", "--directory", ".", "--analysis", "pkg.A"])
        .args(["--ignore", "missing.json", "--quiet"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn test_unknown_entry_exit_code() {
    let temp = TempDir::new().unwrap();
    dynarun(&temp)
        .args(["run", "--entry", "no.such.module"])
        .args(["--analysis", "dynarun.analyses.TraceAnalysis"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Could not find entry no.such.module"));
}

#[test]
fn test_unknown_analysis_exit_code() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("app.py"), "").unwrap();
    dynarun(&temp)
        .args(["run", "--entry", "app.py", "--analysis", "dynarun.analyses.Nope"])
        .assert()
        .code(3);
}

#[test]
fn test_bad_config_file_exit_code() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("dynarun.toml"), "workers = [").unwrap();
    dynarun(&temp)
        .args(["--config", "dynarun.toml", "run", "--entry", "app.py", "-a", "pkg.A"])
        .assert()
        .code(2);
}

#[cfg(unix)]
#[test]
fn test_instrument_reports_failures() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src/app.py"), "").unwrap();

    dynarun(&temp)
        .env("DYNARUN_INSTRUMENTER", "true")
        .args(["instrument", "-d", "src", "-a", "pkg.A", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Instrumented 1 of 1 files"));

    dynarun(&temp)
        .env("DYNARUN_INSTRUMENTER", "false")
        .args(["instrument", "-d", "src", "-a", "pkg.A", "--quiet"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Error at"));
}

#[cfg(unix)]
#[test]
fn test_quiet_instrument_prints_failures_as_they_happen() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src/app.py"), "").unwrap();

    // One line while the batch runs, one with the reason in the summary
    dynarun(&temp)
        .env("DYNARUN_INSTRUMENTER", "false")
        .args(["instrument", "-d", "src", "-a", "pkg.A", "--quiet"])
        .assert()
        .code(1)
        .stdout(predicate::function(|out: &str| {
            let live = out.lines().filter(|l| l.starts_with("Error at ") && !l.contains(": "));
            let summary = out.lines().filter(|l| l.starts_with("Error at ") && l.contains(": "));
            live.count() == 1 && summary.count() == 1
        }));
}

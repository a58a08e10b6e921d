//! CLI integration tests.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const MODEL: &str = "\
# two populations joined at T1
time fixed T0=0
time fixed T1=1
twoN fixed N=1
segment a t=T0 twoN=N samples=1
segment b t=T0 twoN=N samples=1
segment r t=T1 twoN=N
derive a from r
derive b from r
";

fn coalpat_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_coalpat"))
}

fn write_model(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("model.lgo");
    fs::write(&path, MODEL).unwrap();
    path
}

#[test]
fn test_cli_help() {
    coalpat_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Site-pattern probabilities by coalescent simulation",
        ));
}

#[test]
fn test_cli_version() {
    coalpat_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("coalpat"));
}

#[test]
fn test_run_prints_site_patterns() {
    let dir = TempDir::new().unwrap();
    let model = write_model(&dir);
    coalpat_cmd()
        .arg(&model)
        .args(["-i", "500", "-t", "2", "--singletons", "--seed", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SitePat"))
        .stdout(predicate::str::contains("a.0"))
        .stdout(predicate::str::contains("b.0"));
}

#[test]
fn test_run_is_reproducible_with_seed() {
    let dir = TempDir::new().unwrap();
    let model = write_model(&dir);
    let run = || {
        coalpat_cmd()
            .arg(&model)
            .args(["-i", "200", "-t", "1", "--singletons", "--seed", "11"])
            .output()
            .unwrap()
    };
    let a = run();
    let b = run();
    assert!(a.status.success());
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().unwrap();
    let model = write_model(&dir);
    let out = coalpat_cmd()
        .arg(&model)
        .args(["-i", "200", "--singletons", "--seed", "5", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(doc["nreps"], 200);
    assert!(doc["prob"].as_object().unwrap().contains_key("a.0"));
}

#[test]
fn test_observed_table_reports_kl() {
    let dir = TempDir::new().unwrap();
    let model = write_model(&dir);
    let observed = dir.path().join("observed.txt");
    fs::write(&observed, "# SitePat Prob\na.0 0.5\nb.0 0.5\n").unwrap();
    coalpat_cmd()
        .arg(&model)
        .args(["-i", "500", "--singletons", "--seed", "3"])
        .arg("--observed")
        .arg(&observed)
        .assert()
        .success()
        .stdout(predicate::str::contains("KLdiverg"));
}

#[test]
fn test_malformed_model_fails_with_line_number() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.lgo");
    fs::write(&path, "time fixed T0=0\nsegment a t=T0 twoN=NOPE samples=1\n").unwrap();
    coalpat_cmd()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_missing_file_fails() {
    coalpat_cmd()
        .arg("/no/such/file.lgo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file.lgo"));
}

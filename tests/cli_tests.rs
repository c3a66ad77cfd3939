//! Binary integration tests using assert_cmd.
//!
//! Every test points `MAILTALLY_CONFIG` at its own config file so the user's
//! configuration and log directory are never touched.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A command reading `config` as its TOML config file.
fn mailtally_with_config(tmp: &TempDir, config: &str) -> Command {
    let config_file = tmp.child("config.toml");
    config_file.write_str(config).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mailtally"));
    cmd.env("MAILTALLY_CONFIG", config_file.path())
        .env("XDG_CACHE_HOME", tmp.child("cache").path())
        .env_remove("RUST_LOG");
    cmd
}

/// A command with an isolated config; `extra` is appended to the TOML file.
fn mailtally(tmp: &TempDir, extra: &str) -> Command {
    let log_dir = tmp.child("logs");
    mailtally_with_config(
        tmp,
        &format!(
            "[general]\nlog_dir = {:?}\n{extra}",
            log_dir.path().to_string_lossy()
        ),
    )
}

#[test]
fn test_csv_to_stdout() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .args(["-i", "example.com"])
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(
            "type,sizeAtoB,countAtoB,partnerA,partnerB,countBtoA,sizeBtoA\n\
             i2e,120,1,a@example.com,b@example.org,1,80\n\
             i2i,30,1,a@example.com,c@example.com,1,-1\n\
             e2e,0,0,b@example.org,x@other.net,1,5\n",
        )
        .stderr(predicate::str::contains("invalid-from-address"));
}

#[test]
fn test_no_csv_header() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .args(["--no-csv-header", "-i", "example.com"])
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("i2e,120,1,"));
}

#[test]
fn test_internal_hosts_from_config() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "[classification]\ninternal_hosts = [\"example.org\"]\n")
        .arg("--no-csv-header")
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("e2i,120,1,a@example.com,b@example.org,1,80"))
        .stdout(predicate::str::contains("i2e,0,0,b@example.org,x@other.net,1,5"));
}

#[test]
fn test_json_report() {
    let tmp = TempDir::new().unwrap();
    let output = mailtally(&tmp, "")
        .args(["-J", "-i", "example.com"])
        .arg(fixture("smtp.log"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\n    \"createDateTimeUnix\""));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let partners = v["partners"].as_object().unwrap();
    assert_eq!(partners.len(), 3);
    let pair = &partners["a@example.com b@example.org"];
    assert_eq!(pair["mailsTotal"], 2);
    assert_eq!(pair["sizeTotal"], 200);
    assert_eq!(pair["mails"][0]["typeFrom"], "internal");
    assert_eq!(pair["mails"][0]["mailID"].as_str().unwrap().len(), 64);
}

#[test]
fn test_compressed_outfile() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.child("report.csv.gz");
    mailtally(&tmp, "")
        .args(["-i", "example.com", "-Z", "-o"])
        .arg(out.path())
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout("");

    let mut decoder = flate2::read::GzDecoder::new(std::fs::File::open(out.path()).unwrap());
    let mut csv = String::new();
    decoder.read_to_string(&mut csv).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("i2i,30,1,a@example.com,c@example.com,1,-1"));
}

#[test]
fn test_plain_outfile() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.child("report.csv");
    mailtally(&tmp, "")
        .arg("-o")
        .arg(out.path())
        .arg(fixture("smtp.log"))
        .assert()
        .success();
    out.assert(predicate::str::starts_with("type,sizeAtoB"));
}

#[test]
fn test_compress_requires_outfile() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg("-Z")
        .arg(fixture("smtp.log"))
        .assert()
        .failure();
}

#[test]
fn test_no_relevant_lines_exits_cleanly() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg(fixture("noise.log"))
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("No delivered-mail lines"));
}

#[test]
fn test_no_parsable_records_exits_cleanly() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg(fixture("malformed.log"))
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("No parsable mail records"));
}

#[test]
fn test_unreadable_inputs_fail() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg(tmp.path().join("missing.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("could be read"));
}

#[test]
fn test_missing_file_among_others_is_skipped() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg(tmp.path().join("missing.log"))
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("a@example.com,b@example.org"));
}

#[test]
fn test_files_required() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "").assert().failure();
}

#[test]
fn test_summary_json() {
    let tmp = TempDir::new().unwrap();
    let output = mailtally(&tmp, "")
        .args(["summary", "--json", "-i", "example.com"])
        .arg(fixture("smtp.log"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["scan"]["filesOk"], 1);
    assert_eq!(v["scan"]["linesAccepted"], 6);
    assert_eq!(v["pool"]["extracted"], 5);
    assert_eq!(v["pool"]["failed"], 1);
    assert_eq!(v["partners"], 3);
    assert_eq!(v["mailsTotal"], 5);
    assert_eq!(v["byType"]["i2e"], 1);
}

#[test]
fn test_summary_table() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .args(["summary", "-i", "example.com"])
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Partners"))
        .stdout(predicate::str::contains("Top partners:"));
}

#[test]
fn test_verbose_flag_before_summary() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .args(["-v", "summary", "-i", "example.com"])
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Top partners:"))
        .stdout(predicate::str::contains("type,sizeAtoB").not())
        .stderr(predicate::str::contains("Skipping log file").not());
}

#[test]
fn test_broken_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    mailtally_with_config(&tmp, "[general\nbroken = ")
        .arg("--no-csv-header")
        .arg(fixture("smtp.log"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Failed to load config, using defaults"))
        .stdout(predicate::str::contains("e2e,120,1,a@example.com,b@example.org,1,80"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mailtally"));
}

#[test]
fn test_version_flag() {
    let tmp = TempDir::new().unwrap();
    mailtally(&tmp, "")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

//! Tests of the fixture binaries as a sweep would run them.

use std::{
    fs,
    io::{BufRead, BufReader, Read},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use assert_cmd::{cargo::cargo_bin, prelude::*};
use predicates::prelude::*;
use tempfile::tempdir;

fn bin(name: &str) -> Command {
    let mut cmd = Command::cargo_bin(name).expect("binary exists");
    for var in ["GPU", "BATCHSIZE", "BATCH"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_fake_train_reads_environment() {
    let output = bin("fake-train")
        .env("GPU", "2")
        .env("BATCHSIZE", "32")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("accuracy: "));
    assert!(lines[1].starts_with("loss: "));
    let time: f64 = lines[2]
        .strip_prefix("training time: ")
        .unwrap()
        .parse()
        .unwrap();
    assert!((16.0..26.0).contains(&time));
    assert_eq!(lines[3], "GPU count: 2");
    assert_eq!(lines[4], "Batch size: 32");

    // Same inputs through flags give the same report
    bin("fake-train")
        .args(["--gpu", "2", "--batch-size", "32"])
        .assert()
        .success()
        .stdout(predicate::str::diff(stdout));
}

#[test]
fn test_fake_train_defaults() {
    bin("fake-train")
        .assert()
        .success()
        .stdout(predicate::str::contains("GPU count: 1\nBatch size: 32\n"));
}

#[test]
fn test_fake_train_rejects_bad_values() {
    bin("fake-train").env("GPU", "0").assert().code(2);
    bin("fake-train")
        .env("BATCHSIZE", "lots")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_check_csv_default_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("test_concurrent_fail.csv"),
        "GPU,BATCH,accuracy\n1,32,0.5\n2,32,0.6\n",
    )
    .unwrap();

    bin("check-csv")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(
            "Total CSV rows: 3\n\
             Header: GPU,BATCH,accuracy\n\
             Data rows: 2\n\
             Row 1: GPU=1, BATCH=32\n\
             Row 2: GPU=2, BATCH=32\n",
        );
}

#[test]
fn test_check_csv_missing_file() {
    let dir = tempdir().unwrap();
    bin("check-csv")
        .current_dir(dir.path())
        .arg("absent.csv")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: failed to open absent.csv"));
}

#[test]
fn test_probe_completes() {
    bin("interrupt-probe")
        .env("GPU", "1")
        .env("BATCH", "16")
        .args(["--seconds", "1"])
        .assert()
        .success()
        .stdout(
            "Starting experiment with GPU=1, BATCH=16\n\
             Sleeping for 1 seconds (press Ctrl-C to interrupt)...\n\
             Still running... 0s elapsed\n\
             Completed successfully!\n\
             accuracy: 0.95\n",
        );
}

#[test]
fn test_probe_interrupt_exits_130() {
    let mut child = Command::new(cargo_bin("interrupt-probe"))
        .env("GPU", "8")
        .env_remove("BATCH")
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut line = String::new();
    while !line.starts_with("Sleeping") {
        line.clear();
        assert!(stdout.read_line(&mut line).unwrap() > 0, "probe exited early");
    }

    let pid = i32::try_from(child.id()).unwrap();
    // SAFETY: plain kill(2) on our own child
    assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);

    let started = Instant::now();
    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    let status = child.wait().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(status.code(), Some(130));
    assert_eq!(rest.matches("Received signal 2 in child process!").count(), 1);
    assert!(rest.contains("GPU=8, BATCH=N/A"));
    assert!(!rest.contains("Completed successfully!"));
}

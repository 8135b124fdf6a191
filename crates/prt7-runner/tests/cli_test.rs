//! Command line integration tests for the `prt7` binary.
//!
//! These run the built binary end to end: encode a message into a frame
//! script, decode it back and check the JSON summary.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use serde::Deserialize;

// ============================================================================
// JSON Deserialization Types for the Summary
// ============================================================================

#[derive(Debug, Deserialize)]
struct Summary {
    frames_processed: u64,
    invalid_frames: u64,
    idle_reads: u64,
    characters_decoded: usize,
    message: String,
    termination: Option<TerminationEntry>,
}

#[derive(Debug, Deserialize)]
struct TerminationEntry {
    reason: String,
}

// ============================================================================
// Test Helper Functions
// ============================================================================

fn prt7(args: &[&str]) -> Output {
    // CARGO_BIN_EXE_prt7 is set by cargo when running tests for this crate
    let binary = env!("CARGO_BIN_EXE_prt7");
    Command::new(binary)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute prt7")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "prt7 failed:\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn decode_json(input: &Path, extra: &[&str]) -> Summary {
    let mut args = vec!["decode", "--json", "--quiet", "--input", input.to_str().expect("Non-UTF-8 path")];
    args.extend_from_slice(extra);
    let output = prt7(&args);
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).expect("stdout is not UTF-8");
    serde_json::from_str(stdout.trim()).expect("Failed to parse summary JSON")
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_encode_then_decode() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let script = temp_dir.path().join("frames.txt");

    let output = prt7(&[
        "encode",
        "Rendezvous at pier 9",
        "--seed",
        "1234",
        "--rotate-every",
        "2",
        "--output",
        script.to_str().expect("Non-UTF-8 path"),
    ]);
    assert_success(&output);

    let text = fs::read_to_string(&script).expect("Failed to read script");
    assert!(text.lines().any(|line| line.starts_with("M,")), "expected map frames in:\n{text}");

    let summary = decode_json(&script, &[]);
    assert_eq!(summary.message, "RENDEZVOUS AT PIER 9");
    assert_eq!(summary.characters_decoded, 20);
    assert_eq!(summary.frames_processed as usize, text.lines().count());
    assert_eq!(summary.invalid_frames, 0);
    assert_eq!(summary.termination.expect("missing termination").reason, "idle");
}

#[test]
fn test_encode_is_deterministic() {
    let a = prt7(&["encode", "SAME SEED", "--seed", "99"]);
    let b = prt7(&["encode", "SAME SEED", "--seed", "99"]);
    assert_success(&a);
    assert_success(&b);
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn test_decode_writes_summary_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("capture.txt");
    let summary_path = temp_dir.path().join("summary.json");
    fs::write(&input, "M,2\nL,A\nX,1\nM,abc\nL,B\n").expect("Failed to write input");

    let summary = decode_json(&input, &["--output", summary_path.to_str().expect("Non-UTF-8 path")]);
    assert_eq!(summary.message, "CD");
    assert_eq!(summary.frames_processed, 4);
    assert_eq!(summary.invalid_frames, 1);
    assert_eq!(summary.idle_reads, 10);

    let written: Summary =
        serde_json::from_str(&fs::read_to_string(&summary_path).expect("Failed to read summary file"))
            .expect("Failed to parse summary file");
    assert_eq!(written.message, "CD");
}

#[test]
fn test_decode_strict_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("capture.txt");
    fs::write(&input, "M,abc\nL,A\n").expect("Failed to write input");

    let summary = decode_json(&input, &["--strict", "--idle-threshold", "2"]);
    assert_eq!(summary.message, "A");
    assert_eq!(summary.invalid_frames, 1);
    assert_eq!(summary.idle_reads, 2);
}

#[test]
fn test_decode_from_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("capture.txt");
    fs::write(&input, "M,-1\nL,A\n").expect("Failed to write input");

    let config = temp_dir.path().join("run.yaml");
    fs::write(
        &config,
        format!(
            "source:\n  file: {}\nidle_threshold: 3\noutput: json\necho_frames: false\n",
            input.display()
        ),
    )
    .expect("Failed to write config");

    let output = prt7(&["decode", "--config", config.to_str().expect("Non-UTF-8 path")]);
    assert_success(&output);
    let summary: Summary =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).expect("Failed to parse summary JSON");
    assert_eq!(summary.message, "Z");
    assert_eq!(summary.idle_reads, 3);
}

#[test]
fn test_text_output_shows_message() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("capture.txt");
    fs::write(&input, "L,H\nL,I\n").expect("Failed to write input");

    let output = prt7(&["decode", "--input", input.to_str().expect("Non-UTF-8 path")]);
    assert_success(&output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Frame [L,H]"), "stdout:\n{stdout}");
    assert!(stdout.contains("ASSEMBLED HIDDEN MESSAGE"), "stdout:\n{stdout}");
    assert!(stdout.contains("HI"), "stdout:\n{stdout}");
}

#[test]
fn test_missing_input_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = temp_dir.path().join("nope.txt");

    let output = prt7(&["decode", "--json", "--input", missing.to_str().expect("Non-UTF-8 path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open"), "stderr:\n{stderr}");
}

#[test]
fn test_invalid_config_value_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = temp_dir.path().join("run.yaml");
    fs::write(&config, "idle_threshold: 0\n").expect("Failed to write config");

    let output = prt7(&["decode", "--config", config.to_str().expect("Non-UTF-8 path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("idle_threshold"), "stderr:\n{stderr}");
}

#[cfg(unix)]
#[test]
fn test_sigint_stops_decode_waiting_on_stdin() {
    let binary = env!("CARGO_BIN_EXE_prt7");
    let mut child = Command::new(binary)
        .args(["decode", "--json", "--quiet"])
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn prt7");

    // Keep stdin open and silent for the whole test.
    let _stdin = child.stdin.take().expect("No stdin handle");

    // The source is opened after the Ctrl-C handler is installed.
    let mut stderr = BufReader::new(child.stderr.take().expect("No stderr handle"));
    let mut line = String::new();
    loop {
        line.clear();
        let n = stderr.read_line(&mut line).expect("Failed to read stderr");
        assert!(n > 0, "prt7 exited before opening its source");
        if line.contains("frame source opened") {
            break;
        }
    }
    std::thread::sleep(Duration::from_millis(100));

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = child.try_wait().expect("Failed to poll prt7") {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("prt7 did not stop after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(status.success(), "status: {status:?}");

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .expect("No stdout handle")
        .read_to_string(&mut stdout)
        .expect("Failed to read stdout");
    let summary: Summary = serde_json::from_str(stdout.trim()).expect("Failed to parse summary JSON");
    assert_eq!(summary.termination.expect("missing termination").reason, "stopped");
    assert_eq!(summary.idle_reads, 0);
}

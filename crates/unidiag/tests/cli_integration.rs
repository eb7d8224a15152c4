//! Integration tests for the unidiag CLI.

use serde_json as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing as _;
use tracing_subscriber as _;
use unidiag as _;
use unidiag_core as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("unidiag")
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run unidiag")
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn scan_clean_directory_exits_zero() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "hello.txt", b"hello");
    write_file(temp_dir.path(), "caf\u{e9}.txt", b"coffee");

    let output = run(&["scan", temp_dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Subjects:   2"));
    assert!(text.contains("Hazardous:  0"));
}

#[test]
fn scan_reports_hazardous_names_with_exit_two() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "plain.txt", b"x");
    write_file(temp_dir.path(), "emoji_\u{1F600}.txt", b"x");
    write_file(temp_dir.path(), "zalgo_e\u{301}.txt", b"x");
    write_file(temp_dir.path(), ".hidden_\u{1F600}", b"x");

    let output = run(&["scan", temp_dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.contains("Subjects:   3"));
    assert!(text.contains("[outside-bmp]"));
    assert!(text.contains("[combining-mark]"));
    assert!(text.contains("F0 9F 98 80"));
    assert!(!text.contains(".hidden"));
}

#[test]
fn scan_content_and_results_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let data = temp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_file(&data, "good.txt", "caf\u{e9}".as_bytes());
    write_file(&data, "bad.txt", b"\xc0\x80");
    let results = temp_dir.path().join("results.txt");

    let output = run(&[
        "scan",
        data.to_str().unwrap(),
        "--content",
        "-o",
        results.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.contains("File contents"));
    assert!(text.contains("[overlong]"));

    let listing = fs::read_to_string(&results).unwrap();
    assert!(listing.contains("Subject: good.txt"));
    assert!(listing.contains("  U+00E9 []"));
    assert!(listing.contains("Status: overlong"));
}

#[test]
fn scan_json_output_parses() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "pua_\u{E000}.txt", b"x");

    let output = run(&["scan", temp_dir.path().to_str().unwrap(), "--json"]);

    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["names"]["buckets"].is_object());
}

#[cfg(unix)]
#[test]
fn scan_remote_uses_fetch_command() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "a.txt", b"x");

    let output = run(&[
        "scan",
        temp_dir.path().to_str().unwrap(),
        "--remote",
        "--fetch-cmd",
        "echo {target}:{path}",
        "--target",
        "dev0",
    ]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("Device contents"));
}

#[cfg(unix)]
#[test]
fn scan_remote_timeout_is_reported_separately() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "slow.txt", b"x");

    let output = run(&[
        "scan",
        temp_dir.path().to_str().unwrap(),
        "--remote",
        "--fetch-cmd",
        "sleep 5",
        "--timeout",
        "0.2",
    ]);

    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.contains("Timed out:  1"));
    assert!(text.contains("Transport timeouts - 1 subject(s):"));
}

#[cfg(unix)]
#[test]
fn scan_buckets_non_utf8_name_as_invalid_byte() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "fine.txt", b"x");
    fs::write(temp_dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), b"x").unwrap();

    let output = run(&["scan", temp_dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Subjects:   2"));
    assert!(text.contains("[invalid-byte]"));
    assert!(text.contains("bad\u{FFFD}.txt  (62 61 64 FF 2E 74 78 74)"));

    let json = run(&["scan", temp_dir.path().to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    let subject = &value["names"]["buckets"]["InvalidByte"][0]["subject"];
    assert_eq!(
        subject["bytes"],
        serde_json::json!([98, 97, 100, 255, 46, 116, 120, 116])
    );
}

#[cfg(unix)]
#[test]
fn scan_upload_then_reads_back_uploaded_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let data = temp_dir.path().join("data");
    fs::create_dir_all(data.join("sub")).unwrap();
    write_file(&data, "a.txt", "caf\u{e9}".as_bytes());
    write_file(&data.join("sub"), "b.txt", b"plain");
    write_file(&data, "run.py", b"print()");
    let device = temp_dir.path().join("device");
    fs::create_dir(&device).unwrap();
    let device = device.to_str().unwrap();

    let output = run(&[
        "scan",
        data.to_str().unwrap(),
        "--upload",
        "--remote",
        "--dest",
        "store",
        "--copy-cmd",
        &format!("cp {{local}} {device}/{{path}}"),
        "--mkdir-cmd",
        &format!("mkdir {device}/{{path}}"),
        "--fetch-cmd",
        &format!("cat {device}/{{path}}"),
        "--skip-ext",
        "py",
    ]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Device upload"));
    assert!(text.contains("Device contents"));
    assert!(text.contains("Subjects:   2"));
    assert_eq!(
        fs::read(Path::new(device).join("store/sub/b.txt")).unwrap(),
        b"plain"
    );
    assert!(!Path::new(device).join("store/run.py").exists());
}

#[cfg(unix)]
#[test]
fn scan_upload_failures_are_categorised() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_file(temp_dir.path(), "a.txt", b"x");

    let output = run(&[
        "scan",
        temp_dir.path().to_str().unwrap(),
        "--upload",
        "--copy-cmd",
        "false {local}",
        "--mkdir-cmd",
        "true",
    ]);

    assert_eq!(output.status.code(), Some(2));
    let text = stdout(&output);
    assert!(text.contains("Transport failures - 1 subject(s):"));
    assert!(text.contains("  other (1):"));
    assert!(text.contains("    - a.txt: "));
}

#[test]
fn decode_chunked_replace() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = write_file(temp_dir.path(), "in.txt", b"caf\xc3\xa9 \xff!");

    let output = run(&[
        "decode",
        input.to_str().unwrap(),
        "--chunk",
        "1",
        "--errors",
        "replace",
    ]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "caf\u{e9} \u{FFFD}!");
}

#[test]
fn decode_strict_reports_truncation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = write_file(temp_dir.path(), "in.txt", b"ok\xf0\x9f");

    let output = run(&["decode", input.to_str().unwrap(), "--chunk", "3"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("truncated"));
}

#[test]
fn decode_rejects_unknown_codec() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = write_file(temp_dir.path(), "in.txt", b"hi");

    let output = run(&["decode", input.to_str().unwrap(), "--codec", "latin-1"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown encoding"));
}

#[test]
fn char_prints_utf8_bytes() {
    let output = run(&["char", "0xA9"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("U+00A9"));
    assert!(text.contains("UTF-8: C2 A9 (2 byte(s))"));
    assert!(text.contains("Hazards: none"));
}

#[test]
fn char_reports_hazards() {
    let output = run(&["char", "U+1F600"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Hazards: outside-bmp"));
}

#[test]
fn char_rejects_invalid_code_points() {
    for value in ["-1", "0x110000", "0xD800"] {
        let output = run(&["char", value]);
        assert_eq!(output.status.code(), Some(1), "{value}");
        assert!(stderr(&output).starts_with("error: "), "{value}");
    }
}

#[test]
fn help_and_unknown_command() {
    let help = run(&["--help"]);
    assert!(help.status.success());
    assert!(stdout(&help).contains("Usage: unidiag"));

    let unknown = run(&["frobnicate"]);
    assert_eq!(unknown.status.code(), Some(1));
    assert!(stderr(&unknown).contains("unknown command: frobnicate"));
}

//! Integration tests for CLI argument handling and cold-start failures.

use std::io::Write;
use std::net::TcpListener;
use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
  Command::new(env!("CARGO_BIN_EXE_academe"))
    .args(args)
    .env_remove("ACADEME_LOG")
    .output()
    .expect("Failed to execute academe")
}

/// Config file pointing at a port nobody listens on
fn unreachable_config() -> tempfile::NamedTempFile {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);

  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(
    file,
    "api:\n  url: http://127.0.0.1:{}\ncache:\n  fetch_timeout_secs: 5\n",
    port
  )
  .unwrap();
  file
}

#[test]
fn test_help_flag_exits_successfully() {
  let output = run_cli(&["--help"]);
  assert!(output.status.success(), "Expected --help to exit successfully");
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("list"), "Help should mention the list command");
  assert!(stdout.contains("watch"), "Help should mention the watch command");
}

#[test]
fn test_unknown_resource_is_rejected() {
  let output = run_cli(&["list", "courses"]);
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(
    stderr.contains("invalid value"),
    "Should explain the invalid resource: {}",
    stderr
  );
}

#[test]
fn test_missing_config_file_fails() {
  let output = run_cli(&["--config", "/nonexistent/academe.yaml", "list", "projects"]);
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Config file not found"), "{}", stderr);
}

#[test]
fn test_cold_start_with_backend_down_fails() {
  let config = unreachable_config();
  let path = config.path().to_str().unwrap();

  let output = run_cli(&["--config", path, "list", "groups"]);
  assert!(
    !output.status.success(),
    "A cold cache with no backend must surface the error"
  );
  assert!(output.stdout.is_empty());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("request failed"), "{}", stderr);
}

#[test]
fn test_upload_of_missing_file_fails_before_request() {
  let config = unreachable_config();
  let path = config.path().to_str().unwrap();

  let output = run_cli(&[
    "--config",
    path,
    "files",
    "upload",
    "t1",
    "/nonexistent/notes.txt",
  ]);
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Failed to read"), "{}", stderr);
}

#[test]
fn test_evaluate_help_lists_actions() {
  let output = run_cli(&["evaluate", "--help"]);
  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("create"));
  assert!(stdout.contains("list"));
}

use std::process::Command;

fn binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_historian-raw-history")
}

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let config_path = format!("{}/config/raw_history.yaml", env!("CARGO_MANIFEST_DIR"));

    let output = Command::new(binary_path())
        .arg("--config")
        .arg(config_path)
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start historian-raw-history binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Plan for ws://localhost:8002/ws:"));
    assert!(stdout.contains("authenticate as 'admin'"));
    assert!(stdout.contains("write 14 values"));
}

#[test]
fn cli_overrides_replace_file_values() {
    let output = Command::new(binary_path())
        .arg("--url")
        .arg("wss://historian.example/ws")
        .arg("--username")
        .arg("operator")
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .env_remove("HISTORIAN_PASSWORD")
        .output()
        .expect("Failed to start historian-raw-history binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Plan for wss://historian.example/ws:"));
    assert!(stdout.contains("authenticate as 'operator'"));
}

#[test]
fn cli_rejects_invalid_url() {
    let output = Command::new(binary_path())
        .arg("--url")
        .arg("http://localhost:8002/ws")
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start historian-raw-history binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration"));
}

#[test]
fn cli_reports_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let output = Command::new(binary_path())
        .arg("--url")
        .arg(format!("ws://{addr}/ws"))
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start historian-raw-history binary");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Error occurred during client creation: "));
}

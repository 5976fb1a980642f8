//! Command-line behaviour: get, extract, apply and save

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_yaml-patcher"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

/// Temp dir holding a writable copy of the config fixture
fn setup_config() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.yaml");
    fs::copy(fixture("config.yaml"), &config).unwrap();
    (dir, config)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Structural YAML patching"));
}

#[test]
fn test_get_scalar_and_keys() {
    let output = run(&["get", &fixture("config.yaml"), "port"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "8317");

    let output = run(&["get", &fixture("config.yaml"), "oauth-model-alias", "-k", "keys"]);
    let keys: Vec<String> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(keys, ["gemini-cli", "codex"]);

    let output = run(&["get", &fixture("config.yaml"), "missing.key"]);
    assert_eq!(stdout(&output).trim(), "null");
}

#[test]
fn test_extract_falls_back_to_example_section() {
    let output = run(&[
        "extract",
        &fixture("config.yaml"),
        "-r",
        "ampcode",
        "--start",
        "# ampcode-example-start",
        "--end",
        "# ampcode-example-end",
    ]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "ampcode:\n  upstream-url: \"https://ampcode.com\"\n  restrict-management-to-localhost: true\n"
    );

    let output = run(&["extract", &fixture("config.yaml"), "-r", "nothing"]);
    assert!(!output.status.success());
}

#[test]
fn test_apply_writes_and_is_idempotent() {
    let (_dir, config) = setup_config();
    let config_arg = config.to_str().unwrap();
    let patches = fixture("patches.toml");
    let schema = fixture("schema.toml");

    let output = run(&["apply", config_arg, "-p", &patches, "-k", &schema]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("5 applied"));
    assert_eq!(
        fs::read_to_string(&config).unwrap(),
        fs::read_to_string(fixture("config.patched.yaml")).unwrap()
    );

    let output = run(&["apply", config_arg, "-p", &patches, "-k", &schema]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("0 applied"));
    assert!(stdout(&output).contains("5 unchanged"));
}

#[test]
fn test_apply_dry_run_leaves_file() {
    let (_dir, config) = setup_config();
    let before = fs::read_to_string(&config).unwrap();

    let output = run(&[
        "apply",
        config.to_str().unwrap(),
        "-p",
        &fixture("patches.toml"),
        "--dry-run",
        "--diff",
    ]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("DRY RUN"));
    assert!(out.contains("+port: 8080"));
    assert_eq!(fs::read_to_string(&config).unwrap(), before);
}

#[test]
fn test_save_sets_fields() {
    let (_dir, config) = setup_config();

    let output = run(&[
        "save",
        config.to_str().unwrap(),
        "-s",
        &fixture("schema.toml"),
        "--set",
        "port=9000",
        "--set",
        "amp-url=https://amp.example.com",
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("template region(s) expanded"));

    let written = fs::read_to_string(&config).unwrap();
    assert!(written.contains("port: 9000\n"));
    assert!(written.contains("ampcode:\n  upstream-url: \"https://amp.example.com\"\n"));
}

#[test]
fn test_save_without_changes() {
    let (_dir, config) = setup_config();
    let output = run(&[
        "save",
        config.to_str().unwrap(),
        "-s",
        &fixture("schema.toml"),
        "--set",
        "port=8317",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No changes"));
}

#[test]
fn test_save_rejects_unknown_field() {
    let (_dir, config) = setup_config();
    let output = run(&[
        "save",
        config.to_str().unwrap(),
        "-s",
        &fixture("schema.toml"),
        "--set",
        "nope=1",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown field 'nope'"));
}

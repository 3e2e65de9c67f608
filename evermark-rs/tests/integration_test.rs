//! Integration tests for the evermark CLI using fixture exports.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Get the path to a fixture export.
fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .unwrap()
        .join("fixtures")
        .join(name)
}

/// Run evermark and return stdout, stderr and the exit code.
fn run_evermark(input: &Path, vault: &Path, args: &[&str]) -> (String, String, i32) {
    let binary = env!("CARGO_BIN_EXE_evermark");

    let output = Command::new(binary)
        .arg(input)
        .arg(vault)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute evermark");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

mod convert_command {
    use super::*;

    #[test]
    fn prints_json_summary() {
        let vault = TempDir::new().unwrap();
        let (stdout, _, code) = run_evermark(&fixture_path("basic.enex"), vault.path(), &[]);
        assert_eq!(code, 0);

        let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(summary["notes_seen"], 8);
        assert_eq!(summary["notes_converted"], 7);
        assert_eq!(summary["notes_failed"][0]["label"], "Broken");
        assert_eq!(summary["notes_failed"][0]["stage"], "parsing");
    }

    #[test]
    fn failed_notes_do_not_change_exit_code() {
        let vault = TempDir::new().unwrap();
        let (_, stderr, code) = run_evermark(&fixture_path("basic.enex"), vault.path(), &[]);
        assert_eq!(code, 0);
        // Recovered failures are logged as warnings.
        assert!(stderr.contains("Broken"));
    }

    #[test]
    fn yaml_summary() {
        let vault = TempDir::new().unwrap();
        let (stdout, _, code) =
            run_evermark(&fixture_path("notebooks"), vault.path(), &["--yaml"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("notes_converted: 2"));
        assert!(vault.path().join("Work/Plan.md").exists());
    }

    #[test]
    fn quiet_prints_nothing() {
        let vault = TempDir::new().unwrap();
        let (stdout, stderr, code) =
            run_evermark(&fixture_path("basic.enex"), vault.path(), &["-q"]);
        assert_eq!(code, 0);
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
        assert!(vault.path().join("Unfiled/Hello.md").exists());
    }

    #[test]
    fn flags_override_layout() {
        let vault = TempDir::new().unwrap();
        let (_, _, code) = run_evermark(
            &fixture_path("basic.enex"),
            vault.path(),
            &["--layout", "daily", "-q"],
        );
        assert_eq!(code, 0);
        assert!(vault.path().join("2023/12/31/Hello.md").exists());
    }
}

mod errors {
    use super::*;

    #[test]
    fn not_an_export() {
        let vault = TempDir::new().unwrap();
        let (_, stderr, code) = run_evermark(&fixture_path("invalid.enex"), vault.path(), &[]);
        assert_eq!(code, 2);
        assert!(stderr.contains("Not an Evernote export"));
    }

    #[test]
    fn missing_input() {
        let vault = TempDir::new().unwrap();
        let (_, stderr, code) = run_evermark(&fixture_path("nope.enex"), vault.path(), &[]);
        assert_eq!(code, 2);
        assert!(stderr.contains("not found"));
    }

    #[test]
    fn invalid_config_file() {
        let vault = TempDir::new().unwrap();
        let config = vault.path().join("config.toml");
        std::fs::write(&config, "utc_offset = \"somewhere\"\n").unwrap();

        let (_, stderr, code) = run_evermark(
            &fixture_path("basic.enex"),
            &vault.path().join("out"),
            &["--config", config.to_str().unwrap()],
        );
        assert_eq!(code, 3);
        assert!(stderr.contains("utc_offset"));
    }

    #[test]
    fn invalid_offset_flag() {
        let vault = TempDir::new().unwrap();
        let (_, _, code) = run_evermark(
            &fixture_path("basic.enex"),
            vault.path(),
            &["--utc-offset", "noon"],
        );
        assert_eq!(code, 3);
    }
}

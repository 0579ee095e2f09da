//! Integration tests for the issue-bridge binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn bridge() -> Command {
    let mut cmd = cargo_bin_cmd!("issue-bridge");
    for var in [
        "BRIDGE_CONFIG",
        "BRIDGE_HOST",
        "BRIDGE_PORT",
        "BRIDGE_DB_PATH",
        "BRIDGE_TRACKER_URL",
        "BRIDGE_JIRA_URL",
        "BRIDGE_RECONCILE_INTERVAL_SECS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        bridge()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("init-db"));
    }

    #[test]
    fn test_version() {
        bridge().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        bridge().arg("frobnicate").assert().failure();
    }

    #[test]
    fn test_invalid_log_format_fails() {
        bridge()
            .args(["--log-format", "yaml", "classify", "vm_down"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid log format"));
    }
}

mod classify {
    use super::*;

    #[test]
    fn test_classify_database_code() {
        bridge()
            .args(["classify", "db_timeout"])
            .assert()
            .success()
            .stdout(predicate::str::contains("database"))
            .stdout(predicate::str::contains("10002"));
    }

    #[test]
    fn test_classify_unknown_code_uses_default_project() {
        bridge()
            .args(["classify", "disk_full"])
            .assert()
            .success()
            .stdout(predicate::str::contains("10004"));
    }
}

mod init_db {
    use super::*;

    #[test]
    fn test_init_db_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested/state/bridge.db");

        bridge()
            .current_dir(dir.path())
            .args(["init-db", "--db-path"])
            .arg(&db_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Bridge database initialized"));

        assert!(db_path.exists());
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("bridge.db");

        for _ in 0..2 {
            bridge()
                .current_dir(dir.path())
                .args(["init-db", "--db-path"])
                .arg(&db_path)
                .assert()
                .success();
        }
    }

    #[test]
    fn test_init_db_reads_path_from_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bridge.toml"),
            "[database]\npath = \"from-config.db\"\n",
        )
        .unwrap();

        bridge()
            .current_dir(dir.path())
            .arg("init-db")
            .assert()
            .success();

        assert!(dir.path().join("from-config.db").exists());
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_shows_file_values() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bridge.toml"), "[server]\nport = 9123\n").unwrap();

        bridge()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9123"))
            .stdout(predicate::str::contains("No warnings"));
    }

    #[test]
    fn test_config_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bridge.toml"), "[server]\nport = 9123\n").unwrap();

        bridge()
            .current_dir(dir.path())
            .env("BRIDGE_PORT", "9456")
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9456"));
    }

    #[test]
    fn test_config_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bridge.toml"),
            "[reconcile]\ninterval_secs = 0\n",
        )
        .unwrap();

        bridge()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("warning: reconcile.interval_secs"));
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bridge.toml"), "[server\n").unwrap();

        bridge()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .failure();
    }
}

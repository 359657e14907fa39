use assert_cmd::Command;
use predicates::str::contains;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

/// Runs the binary with its work dir and config home inside `tmp`.
fn ipcsniff(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ipcsniff").unwrap();
    cmd.env("TMPDIR", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path())
        .env_remove("RUST_LOG");
    cmd
}

fn absent_browser_config(tmp: &TempDir, extra: &str) -> PathBuf {
    write_config(
        tmp.path(),
        &format!(
            "process_name = \"no-such-browser-7f3a\"\nmodule_file_name = \"no-such-browser-7f3a\"\ninstall_dir = {:?}\n{}",
            tmp.path().join("missing").display().to_string(),
            extra
        ),
    )
}

#[test]
fn help_lists_subcommands() {
    let tmp = TempDir::new().unwrap();
    ipcsniff(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("capture"))
        .stdout(contains("processes"))
        .stdout(contains("resolve"));
}

#[test]
fn invalid_override_exits_with_config_code() {
    let tmp = TempDir::new().unwrap();
    let config = absent_browser_config(&tmp, "");

    ipcsniff(&tmp)
        .args(["resolve", "--custom-ipc-name", "has space", "--config"])
        .arg(&config)
        .assert()
        .code(3)
        .stderr(contains("Invalid custom IPC name"));
}

#[test]
fn missing_config_file_exits_with_config_code() {
    let tmp = TempDir::new().unwrap();

    ipcsniff(&tmp)
        .args(["processes", "--config"])
        .arg(tmp.path().join("nope.toml"))
        .assert()
        .code(3)
        .stderr(contains("Failed to load configuration"));
}

#[test]
fn unresolvable_binary_exits_with_resolution_code() {
    let tmp = TempDir::new().unwrap();
    let config = absent_browser_config(&tmp, "");

    ipcsniff(&tmp)
        .args(["resolve", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("Could not find no-such-browser-7f3a"))
        .stderr(contains("Aborting."));
}

#[test]
fn resolve_picks_newest_installed_version() {
    let tmp = TempDir::new().unwrap();
    let install_dir = tmp.path().join("Application");
    for version in ["88.0.4324.150", "90.0.4430.85", "89.0.4389.90"] {
        let dir = install_dir.join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("fakebrowser"), b"").unwrap();
    }
    let config = write_config(
        tmp.path(),
        &format!(
            "process_name = \"no-such-browser-7f3a\"\nmodule_file_name = \"fakebrowser\"\ninstall_dir = {:?}\n",
            install_dir.display().to_string()
        ),
    );

    ipcsniff(&tmp)
        .args(["resolve", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("Version: 90.0.4430.85"))
        .stdout(contains("Channel: chromiumipc"));
}

#[test]
fn resolve_fully_custom_target() {
    let tmp = TempDir::new().unwrap();
    let config = absent_browser_config(&tmp, "");

    ipcsniff(&tmp)
        .args([
            "resolve",
            "--custom-process-name",
            "msedge",
            "--custom-ipc-name",
            "edgeipc",
            "--custom-chromium-version",
            "120.0.2210.91",
            "--config",
        ])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("custom target"))
        .stdout(contains("Version: 120.0.2210.91"))
        .stdout(contains("Channel: edgeipc"));
}

#[test]
fn processes_reports_when_nothing_runs() {
    let tmp = TempDir::new().unwrap();
    let config = absent_browser_config(&tmp, "");

    ipcsniff(&tmp)
        .args(["processes", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("No running no-such-browser-7f3a processes"));
}

#[cfg(unix)]
#[test]
fn capture_without_producer_is_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let config = absent_browser_config(
        &tmp,
        "handshake_timeout_ms = 200\nmetadata_endpoint = \"http://127.0.0.1:9\"\n",
    );

    ipcsniff(&tmp)
        .args([
            "capture",
            "--custom-process-name",
            "no-such-browser-7f3a",
            "--custom-ipc-name",
            "testipc",
            "--custom-chromium-version",
            "90.0.4430.85",
            "--config",
        ])
        .arg(&config)
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .success()
        .stdout(contains("No interface metadata available"))
        .stdout(contains("Could not start capture on channel testipc"));
}

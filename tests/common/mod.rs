//! Common test utilities for shellrun tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use shellrun::{ShellKind, ShellPrograms};

/// Creates a temporary directory containing one file
pub fn create_dir_with_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join(name), content).expect("Failed to write file");
    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Writes a config file into a fresh temporary directory
pub fn create_config_file(content: &str) -> (TempDir, PathBuf) {
    let (dir, path) = create_dir_with_file("shellrun.toml", content);
    (dir, path.join("shellrun.toml"))
}

/// Whether the default program for `shell` is installed
pub fn shell_available(shell: ShellKind) -> bool {
    ShellPrograms::default().locate(shell).is_some()
}

/// Returns true (after printing a note) when `shell` is missing
pub fn skip_without(shell: ShellKind) -> bool {
    if shell_available(shell) {
        return false;
    }
    eprintln!("skipping: '{}' not installed", shell);
    true
}

/// Poll `check` until it holds or `limit` elapses
pub fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    check()
}

/// Canonical form of a path for comparisons across symlinked temp dirs
pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().expect("Failed to canonicalize path")
}

/// Sample config exercising every section
pub const SAMPLE_CONFIG: &str = r#"
[defaults]
shell = "sh"
timeout_ms = 5000
max_concurrent = 4

[context]
execution_policy = "RemoteSigned"

[context.env]
SHELLRUN_SAMPLE = "from-config"

[shells]
powershell = "pwsh"
"#;

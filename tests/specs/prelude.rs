//! Shared helpers for behavioral specs
//!
//! Every [`Project`] gets its own workspace and state directory, so specs can
//! run in parallel without sharing a daemon.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use predicates::prelude::*;
use tempfile::TempDir;

/// Upper bound for anything a spec waits on
pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

const SPEC_POLL_INTERVAL_MS: u64 = 20;

/// Daemon loops tuned to cycle quickly
pub const FAST_DAEMON: &str = r#"
[daemon]
schedule_interval = "1s"
sensor_interval = "200ms"
queue_interval = "100ms"
"#;

/// Poll `condition` until it holds or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
    }
    condition()
}

fn binary(name: &str) -> PathBuf {
    assert_cmd::cargo::cargo_bin(name)
}

pub struct Project {
    dir: TempDir,
    state: TempDir,
}

impl Project {
    /// Workspace with a config that defines no triggers
    pub fn empty() -> Self {
        Self::with_config("")
    }

    pub fn with_config(config: &str) -> Self {
        let project = Self {
            dir: TempDir::new().unwrap(),
            state: TempDir::new().unwrap(),
        };
        project.file("cadence.toml", config);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stands in for both `XDG_STATE_HOME` and the socket directory
    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    /// Per-config state directory (`<state>/cadence/<hash>`), once the daemon
    /// has created it
    pub fn daemon_dir(&self) -> Option<PathBuf> {
        std::fs::read_dir(self.state_path().join("cadence"))
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.is_dir())
    }

    pub fn file(&self, relative: &str, content: &str) {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative)).unwrap_or_default()
    }

    /// `cadence` invocation scoped to this project
    pub fn cadence(&self) -> CliBuilder {
        let mut cmd = Command::new(binary("cadence"));
        cmd.current_dir(self.path())
            .env("XDG_STATE_HOME", self.state_path())
            .env("CADENCE_SOCKET_DIR", self.state_path())
            .env("CADENCE_DAEMON_BINARY", binary("cadenced"))
            .env_remove("RUST_LOG");
        CliBuilder { cmd }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = self.cadence().args(&["daemon", "stop"]).cmd.output();
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Start without waiting; for long-running commands like `watch`
    pub fn spawn(mut self) -> std::process::Child {
        self.cmd.spawn().unwrap()
    }

    /// Run and require a zero exit status
    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            run.output.status.success(),
            "expected success, got {}\nstdout:\n{}\nstderr:\n{}",
            run.output.status,
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and require a non-zero exit status
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            !run.output.status.success(),
            "expected failure\nstdout:\n{}\nstderr:\n{}",
            run.stdout(),
            run.stderr()
        );
        run
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            predicate::str::contains(expected).eval(&stdout),
            "stdout missing {:?}:\n{}",
            expected,
            stdout
        );
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !predicate::str::contains(unexpected).eval(&stdout),
            "stdout unexpectedly has {:?}:\n{}",
            unexpected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            predicate::str::contains(expected).eval(&stderr),
            "stderr missing {:?}:\n{}",
            expected,
            stderr
        );
        self
    }

    pub fn stderr_lacks(self, unexpected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            !predicate::str::contains(unexpected).eval(&stderr),
            "stderr unexpectedly has {:?}:\n{}",
            unexpected,
            stderr
        );
        self
    }
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Scratch data directory plus helpers for driving the gt binary.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn remote_dir(&self) -> PathBuf {
        let dir = self.dir.path().join("remote");
        fs::create_dir_all(&dir).expect("create remote dir");
        dir
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.data_dir().join("glasstask.toml");
        fs::create_dir_all(self.data_dir()).expect("create data dir");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    /// gt with an isolated environment and this env's data dir.
    pub fn gt(&self) -> Command {
        gt_for(&self.data_dir())
    }

    /// Run gt with `--json` and return the parsed success envelope's data.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.gt().arg("--json").args(args).output().expect("run gt");
        assert!(
            output.status.success(),
            "gt {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    pub fn stored_titles(&self) -> Vec<String> {
        self.stored_tasks()
            .iter()
            .filter_map(|task| task["title"].as_str().map(str::to_string))
            .collect()
    }

    pub fn stored_tasks(&self) -> Vec<Value> {
        let raw = fs::read_to_string(self.tasks_file()).expect("read tasks file");
        let value: Value = serde_json::from_str(&raw).expect("tasks json");
        value["tasks"].as_array().cloned().unwrap_or_default()
    }
}

pub fn gt_for(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gt").expect("binary");
    cmd.env_remove("GLASSTASK_USER")
        .env_remove("GLASSTASK_CONFIG")
        .env_remove("GLASSTASK_REMOTE_DIR")
        .env_remove("RUST_LOG")
        .env("GLASSTASK_DATA_DIR", data_dir);
    cmd
}

/// gt as a plain process, for runs that stay in the background.
pub fn gt_process(data_dir: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(cargo_bin("gt"));
    cmd.env_remove("GLASSTASK_USER")
        .env_remove("GLASSTASK_CONFIG")
        .env_remove("GLASSTASK_REMOTE_DIR")
        .env_remove("RUST_LOG")
        .env("GLASSTASK_DATA_DIR", data_dir);
    cmd
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll `check` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

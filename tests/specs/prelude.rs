//! Shared helpers for behavioral specs.
//!
//! `Project` owns a temp directory holding scenario and config files;
//! `Project::fencelock()` builds an invocation run from that directory.

#![allow(dead_code)]

use std::path::Path;
use std::process::Output;
use tempfile::TempDir;

pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root
    pub fn file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn fencelock(&self) -> CliBuilder {
        CliBuilder {
            cwd: self.dir.path().to_path_buf(),
            args: Vec::new(),
        }
    }
}

pub struct CliBuilder {
    cwd: std::path::PathBuf,
    args: Vec<String>,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| a.to_string()));
        self
    }

    fn output(self) -> Output {
        assert_cmd::Command::cargo_bin("fencelock")
            .unwrap()
            .current_dir(&self.cwd)
            .env_remove("FENCELOCK_LOG")
            .args(&self.args)
            .output()
            .unwrap()
    }

    /// Run and require exit code 0
    pub fn passes(self) -> RunAssert {
        let args = self.args.join(" ");
        let output = self.output();
        assert!(
            output.status.success(),
            "expected `fencelock {}` to pass, got {:?}\nstderr:\n{}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and require a non-zero exit code
    pub fn fails(self) -> RunAssert {
        let args = self.args.join(" ");
        let output = self.output();
        assert!(
            !output.status.success(),
            "expected `fencelock {}` to fail\nstdout:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
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

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(needle), "stdout missing {:?}:\n{}", needle, stdout);
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        let stdout = self.stdout();
        assert!(!stdout.contains(needle), "stdout unexpectedly has {:?}:\n{}", needle, stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(needle), "stderr missing {:?}:\n{}", needle, stderr);
        self
    }
}

//! Test-only helpers: a throwaway Laravel-shaped project and a scripted tool runner.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::tools::{Invocation, ToolOutput, ToolRunner};

/// `.env` as a fresh project ships it: file-backed drivers.
pub const FRESH_ENV: &str = "APP_NAME=Laravel\n\
APP_ENV=local\n\
SESSION_DRIVER=file\n\
QUEUE_CONNECTION=sync\n\
CACHE_STORE=file\n";

pub const FRESH_MANIFEST: &str = r#"{
  "name": "laravel/laravel",
  "type": "project",
  "require": {
    "php": "^8.2"
  },
  "scripts": {
    "test": "phpunit"
  },
  "minimum-stability": "stable",
  "prefer-stable": true
}
"#;

/// A temporary project root seeded with `.env`, `.env.example` and `composer.json`.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let project = Self::empty();
        project.write(".env", FRESH_ENV);
        project.write(".env.example", FRESH_ENV);
        project.write("composer.json", FRESH_MANIFEST);
        project
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write fixture");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read fixture")
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("remove fixture");
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Records every invocation and answers from a table keyed by the rendered
/// command line. Unknown commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedToolRunner {
    calls: RefCell<Vec<String>>,
    responses: HashMap<String, ToolOutput>,
    unrunnable: Vec<String>,
}

impl ScriptedToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit non-zero.
    pub fn failing(mut self, command: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            ToolOutput {
                exit_ok: false,
                timed_out: false,
                stdout: String::new(),
            },
        );
        self
    }

    /// Make `command` print `stdout` and exit with `exit_ok`.
    pub fn responding(mut self, command: &str, exit_ok: bool, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            ToolOutput {
                exit_ok,
                timed_out: false,
                stdout: stdout.to_string(),
            },
        );
        self
    }

    /// Make `command` fail to start at all.
    pub fn unrunnable(mut self, command: &str) -> Self {
        self.unrunnable.push(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ToolRunner for ScriptedToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let command = invocation.display();
        self.calls.borrow_mut().push(command.clone());
        if self.unrunnable.contains(&command) {
            return Err(anyhow!("spawn {command}: no such file or directory"));
        }
        Ok(self
            .responses
            .get(&command)
            .cloned()
            .unwrap_or(ToolOutput {
                exit_ok: true,
                timed_out: false,
                stdout: String::new(),
            }))
    }
}

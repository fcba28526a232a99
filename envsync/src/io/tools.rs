//! Adapters for the framework and package-manager commands.
//!
//! Every call is a blocking subprocess with a binary outcome. Nothing here
//! retries; callers decide whether a failure stops the chain.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::ReconcileError;
use crate::io::config::ToolsConfig;
use crate::io::process::run_command_with_timeout;

/// Named cache-clearing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheOp {
    Config,
    General,
    Route,
    View,
}

impl CacheOp {
    pub const ALL: [CacheOp; 4] = [CacheOp::Config, CacheOp::General, CacheOp::Route, CacheOp::View];

    pub fn subcommand(self) -> &'static str {
        match self {
            CacheOp::Config => "config:clear",
            CacheOp::General => "cache:clear",
            CacheOp::Route => "route:clear",
            CacheOp::View => "view:clear",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CacheOp::Config => "config cache",
            CacheOp::General => "application cache",
            CacheOp::Route => "route cache",
            CacheOp::View => "view cache",
        }
    }
}

/// Package-manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOp {
    Install,
    Update,
    ListOutdated,
    UpdateNode,
    RefreshAutoload,
}

impl PackageOp {
    pub fn label(self) -> &'static str {
        match self {
            PackageOp::Install => "install dependencies",
            PackageOp::Update => "update dependencies",
            PackageOp::ListOutdated => "list outdated node packages",
            PackageOp::UpdateNode => "update node packages",
            PackageOp::RefreshAutoload => "refresh autoload index",
        }
    }
}

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl Invocation {
    fn new(prefix: &[String], extra: &[&str], workdir: &Path) -> Self {
        let mut parts = prefix.iter().cloned();
        let program = parts.next().unwrap_or_default();
        let mut args: Vec<String> = parts.collect();
        args.extend(extra.iter().map(|arg| arg.to_string()));
        Self {
            program,
            args,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Shell-like rendering for status lines.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// What came back from an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_ok: bool,
    pub timed_out: bool,
    pub stdout: String,
}

impl ToolOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_ok && !self.timed_out
    }

    pub fn produced_output(&self) -> bool {
        !self.timed_out && !self.stdout.trim().is_empty()
    }
}

/// Seam for executing external commands.
pub trait ToolRunner {
    /// `Err` only when the command could not be run at all.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemToolRunner {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl SystemToolRunner {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(tools.timeout_secs),
            output_limit_bytes: tools.output_limit_bytes,
        }
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).current_dir(&invocation.workdir);
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)?;
        if output.stdout_truncated > 0 {
            warn!(
                command = %invocation.display(),
                dropped_bytes = output.stdout_truncated,
                "stdout truncated"
            );
        }
        if !output.status.success() {
            debug!(
                command = %invocation.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "command exited unsuccessfully"
            );
        }
        Ok(ToolOutput {
            exit_ok: output.status.success(),
            timed_out: output.timed_out,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

fn invoke<R: ToolRunner + ?Sized>(
    runner: &R,
    invocation: &Invocation,
) -> Result<ToolOutput, ReconcileError> {
    let command = invocation.display();
    match runner.run(invocation) {
        Ok(output) => Ok(output),
        Err(err) => {
            warn!(command = %command, err = %format!("{err:#}"), "external command could not run");
            Err(ReconcileError::ExternalCallFailed { command })
        }
    }
}

fn require_success(invocation: &Invocation, output: &ToolOutput) -> Result<(), ReconcileError> {
    if output.succeeded() {
        return Ok(());
    }
    warn!(
        command = %invocation.display(),
        timed_out = output.timed_out,
        "external command failed"
    );
    Err(ReconcileError::ExternalCallFailed {
        command: invocation.display(),
    })
}

/// Clears framework caches via the `artisan` command prefix.
pub struct CacheInvalidator<'a, R: ToolRunner + ?Sized> {
    runner: &'a R,
    root: &'a Path,
    artisan: &'a [String],
}

impl<'a, R: ToolRunner + ?Sized> CacheInvalidator<'a, R> {
    pub fn new(runner: &'a R, root: &'a Path, tools: &'a ToolsConfig) -> Self {
        Self {
            runner,
            root,
            artisan: &tools.artisan,
        }
    }

    pub fn invocation(&self, op: CacheOp) -> Invocation {
        Invocation::new(self.artisan, &[op.subcommand()], self.root)
    }

    pub fn clear(&self, op: CacheOp) -> Result<(), ReconcileError> {
        let invocation = self.invocation(op);
        let output = invoke(self.runner, &invocation)?;
        require_success(&invocation, &output)
    }
}

/// Drives the PHP and Node package managers.
pub struct PackageManager<'a, R: ToolRunner + ?Sized> {
    runner: &'a R,
    root: &'a Path,
    tools: &'a ToolsConfig,
}

impl<'a, R: ToolRunner + ?Sized> PackageManager<'a, R> {
    pub fn new(runner: &'a R, root: &'a Path, tools: &'a ToolsConfig) -> Self {
        Self {
            runner,
            root,
            tools,
        }
    }

    pub fn invocation(&self, op: PackageOp) -> Invocation {
        match op {
            PackageOp::Install => Invocation::new(&self.tools.composer, &["install"], self.root),
            PackageOp::Update => Invocation::new(&self.tools.composer, &["update"], self.root),
            PackageOp::RefreshAutoload => {
                Invocation::new(&self.tools.composer, &["dump-autoload"], self.root)
            }
            PackageOp::ListOutdated => Invocation::new(&self.tools.npm, &["outdated"], self.root),
            PackageOp::UpdateNode => {
                Invocation::new(&self.tools.npm, &["update", "--no-save"], self.root)
            }
        }
    }

    /// Run an operation judged by its exit status.
    pub fn run(&self, op: PackageOp) -> Result<(), ReconcileError> {
        let invocation = self.invocation(op);
        let output = invoke(self.runner, &invocation)?;
        require_success(&invocation, &output)
    }

    /// True when the outdated listing printed anything.
    ///
    /// The listing exits non-zero whenever something is outdated, so it is
    /// judged by captured output instead of exit status. A timeout is a failure.
    pub fn list_outdated(&self) -> Result<bool, ReconcileError> {
        let invocation = self.invocation(PackageOp::ListOutdated);
        let output = invoke(self.runner, &invocation)?;
        if output.timed_out {
            warn!(command = %invocation.display(), "external command timed out");
            return Err(ReconcileError::ExternalCallFailed {
                command: invocation.display(),
            });
        }
        Ok(output.produced_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FixedRunner {
        output: ToolOutput,
        seen: RefCell<Vec<String>>,
    }

    impl ToolRunner for FixedRunner {
        fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
            self.seen.borrow_mut().push(invocation.display());
            Ok(self.output.clone())
        }
    }

    fn runner(exit_ok: bool, stdout: &str) -> FixedRunner {
        FixedRunner {
            output: ToolOutput {
                exit_ok,
                timed_out: false,
                stdout: stdout.to_string(),
            },
            seen: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn cache_ops_map_to_artisan_subcommands() {
        let tools = ToolsConfig::default();
        let fake = runner(true, "");
        let cache = CacheInvalidator::new(&fake, Path::new("/app"), &tools);
        for op in CacheOp::ALL {
            cache.clear(op).expect("clear");
        }
        assert_eq!(
            *fake.seen.borrow(),
            vec![
                "php artisan config:clear",
                "php artisan cache:clear",
                "php artisan route:clear",
                "php artisan view:clear",
            ]
        );
    }

    #[test]
    fn non_zero_exit_is_external_call_failure() {
        let tools = ToolsConfig::default();
        let fake = runner(false, "");
        let packages = PackageManager::new(&fake, Path::new("/app"), &tools);
        let err = packages.run(PackageOp::Update).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::ExternalCallFailed { ref command } if command == "composer update"
        ));
    }

    #[test]
    fn list_outdated_is_judged_by_output() {
        let tools = ToolsConfig::default();
        let listed = runner(false, "laravel-vite-plugin  1.0.0  1.2.0\n");
        let packages = PackageManager::new(&listed, Path::new("/app"), &tools);
        assert!(packages.list_outdated().expect("outdated"));

        let quiet = runner(true, "\n");
        let packages = PackageManager::new(&quiet, Path::new("/app"), &tools);
        assert!(!packages.list_outdated().expect("outdated"));
    }

    #[test]
    fn timed_out_listing_is_a_failure_not_up_to_date() {
        let tools = ToolsConfig::default();
        let mut timed_out = runner(false, "");
        timed_out.output.timed_out = true;
        let packages = PackageManager::new(&timed_out, Path::new("/app"), &tools);
        let err = packages.list_outdated().unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::ExternalCallFailed { ref command } if command == "npm outdated"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_keeps_output_within_limit() {
        let runner = SystemToolRunner {
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4,
        };
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "printf abcdefgh".to_string()],
            workdir: PathBuf::from("."),
        };
        let output = runner.run(&invocation).expect("run");
        assert!(output.succeeded());
        assert_eq!(output.stdout, "abcd");
    }

    #[test]
    fn invocation_keeps_prefix_arguments() {
        let tools = ToolsConfig {
            composer: vec!["php".to_string(), "composer.phar".to_string()],
            ..ToolsConfig::default()
        };
        let fake = runner(true, "");
        let packages = PackageManager::new(&fake, Path::new("/app"), &tools);
        let invocation = packages.invocation(PackageOp::RefreshAutoload);
        assert_eq!(invocation.program, "php");
        assert_eq!(invocation.args, vec!["composer.phar", "dump-autoload"]);
        assert_eq!(invocation.workdir, PathBuf::from("/app"));
    }
}

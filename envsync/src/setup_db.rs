//! `setup:db`: switch a project to database-backed drivers.
//!
//! Runs the key/value reconciler over every env target and the manifest
//! reconciler over the setup scripts, then clears caches and refreshes the
//! autoload index. When every artifact already matches, nothing is written and
//! no external command is run.

use std::path::Path;

use tracing::{info, instrument};

use crate::chain::external_step;
use crate::core::types::{ReconcileResult, RunOutcome};
use crate::env_files::EnvFileReconciler;
use crate::guard::InvocationGuard;
use crate::io::config::EnvsyncConfig;
use crate::io::paths::ProjectPaths;
use crate::io::tools::{CacheInvalidator, PackageManager, PackageOp, ToolRunner};
use crate::manifest_scripts::ManifestReconciler;
use crate::report::Report;

pub const COMMAND: &str = "setup:db";

#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_setup_db<R: ToolRunner + ?Sized>(
    root: &Path,
    cfg: &EnvsyncConfig,
    guard: &InvocationGuard,
    tools: &R,
    report: &mut Report,
) -> RunOutcome {
    let Some(_token) = guard.try_enter() else {
        report.warn(format!("{COMMAND} is already running, skipping nested call"));
        return RunOutcome::skipped(COMMAND);
    };

    let paths = ProjectPaths::new(root, cfg);
    let desired = cfg.setup_state();
    let env = EnvFileReconciler::new(&desired.env);
    let manifest = ManifestReconciler::new(&desired.scripts);

    if env.is_satisfied(&paths.env_targets) && manifest.is_satisfied(&paths.manifest_path) {
        info!("all artifacts already match");
        report.info("nothing to change: database configuration is already applied");
        return RunOutcome::up_to_date();
    }

    let mut artifacts = env.reconcile_all(&paths.env_targets, report);
    if artifacts.iter().any(ReconcileResult::blocks_run) {
        report.error("env files could not be converged, stopping before the manifest");
        return RunOutcome::failed(artifacts, Vec::new());
    }

    let manifest_result = manifest.reconcile(&paths.manifest_path, report);
    let manifest_ok = manifest_result.is_success();
    artifacts.push(manifest_result);
    if !manifest_ok {
        return RunOutcome::failed(artifacts, Vec::new());
    }

    let cache = CacheInvalidator::new(tools, root, &cfg.tools);
    for op in &cfg.setup.cache_clear {
        let label = format!("clearing {}", op.label());
        if let Err(failure) = external_step(report, &label, || cache.clear(*op)) {
            return RunOutcome::failed(artifacts, vec![failure]);
        }
    }
    if cfg.setup.refresh_autoload {
        let packages = PackageManager::new(tools, root, &cfg.tools);
        let label = PackageOp::RefreshAutoload.label();
        if let Err(failure) =
            external_step(report, label, || packages.run(PackageOp::RefreshAutoload))
        {
            return RunOutcome::failed(artifacts, vec![failure]);
        }
    }

    report.success("database configuration applied");
    RunOutcome::completed(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ArtifactState;
    use crate::core::types::{ErrorKind, RunStatus};
    use crate::report::StatusLevel;
    use crate::test_support::{ScriptedToolRunner, TestProject};

    const POST_STEPS: [&str; 3] = [
        "php artisan config:clear",
        "php artisan cache:clear",
        "composer dump-autoload",
    ];

    #[test]
    fn converges_fresh_project_then_runs_post_steps() {
        let project = TestProject::new();
        let runner = ScriptedToolRunner::new();
        let mut report = Report::new();

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            &runner,
            &mut report,
        );

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.artifacts.len(), 3);
        assert!(outcome.artifacts.iter().all(|result| result.state == ArtifactState::Verified));
        assert!(project.read(".env").contains("SESSION_DRIVER=database"));
        assert!(project.read(".env.example").contains("CACHE_STORE=database"));
        assert!(project.read("composer.json").contains("php artisan migrate --graceful"));
        assert_eq!(runner.calls(), POST_STEPS);
        assert!(report.contains(StatusLevel::Success, "database configuration applied"));
    }

    #[test]
    fn second_run_is_up_to_date_without_tool_calls() {
        let project = TestProject::new();
        let cfg = EnvsyncConfig::default();
        let guard = InvocationGuard::new();
        run_setup_db(project.root(), &cfg, &guard, &ScriptedToolRunner::new(), &mut Report::new());
        let env_before = project.read(".env");
        let manifest_before = project.read("composer.json");

        let runner = ScriptedToolRunner::new();
        let outcome = run_setup_db(project.root(), &cfg, &guard, &runner, &mut Report::new());

        assert_eq!(outcome.status, RunStatus::UpToDate);
        assert!(runner.calls().is_empty());
        assert_eq!(project.read(".env"), env_before);
        assert_eq!(project.read("composer.json"), manifest_before);
    }

    #[test]
    fn malformed_manifest_fails_before_post_steps() {
        let project = TestProject::new();
        project.write("composer.json", "{ \"scripts\": ");
        let runner = ScriptedToolRunner::new();

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            &runner,
            &mut Report::new(),
        );

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(runner.calls().is_empty());
        let manifest = outcome
            .artifact(&project.path("composer.json"))
            .expect("manifest result");
        assert!(manifest.has_failure(ErrorKind::ArtifactMalformed));
        assert_eq!(project.read("composer.json"), "{ \"scripts\": ");
    }

    #[test]
    fn missing_required_env_stops_the_run() {
        let project = TestProject::new();
        project.remove(".env");
        let runner = ScriptedToolRunner::new();

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            &runner,
            &mut Report::new(),
        );

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(runner.calls().is_empty());
        assert!(outcome.artifact(&project.path("composer.json")).is_none());
        assert_eq!(project.read("composer.json"), crate::test_support::FRESH_MANIFEST);
    }

    #[test]
    fn missing_optional_env_is_tolerated() {
        let project = TestProject::new();
        project.remove(".env.example");

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            &ScriptedToolRunner::new(),
            &mut Report::new(),
        );

        assert_eq!(outcome.status, RunStatus::Completed);
        let example = outcome
            .artifact(&project.path(".env.example"))
            .expect("example result");
        assert!(example.has_failure(ErrorKind::ArtifactMissing));
    }

    #[test]
    fn failing_cache_clear_stops_the_chain_and_keeps_edits() {
        let project = TestProject::new();
        let runner = ScriptedToolRunner::new().failing("php artisan config:clear");

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            &runner,
            &mut Report::new(),
        );

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(runner.calls(), vec!["php artisan config:clear"]);
        assert_eq!(outcome.failures[0].kind, ErrorKind::ExternalCallFailed);
        assert!(project.read(".env").contains("SESSION_DRIVER=database"));
    }

    #[test]
    fn held_guard_skips_without_touching_anything() {
        let project = TestProject::new();
        let guard = InvocationGuard::new();
        let _held = guard.try_enter().expect("enter");
        let runner = ScriptedToolRunner::new();

        let outcome = run_setup_db(
            project.root(),
            &EnvsyncConfig::default(),
            &guard,
            &runner,
            &mut Report::new(),
        );

        assert_eq!(outcome.status, RunStatus::Skipped);
        assert_eq!(outcome.failures[0].kind, ErrorKind::ReentrantInvocation);
        assert!(runner.calls().is_empty());
        assert_eq!(project.read(".env"), crate::test_support::FRESH_ENV);
    }
}

//! `fix:composer`: restore the manifest's scripts and refresh dependencies.
//!
//! The manifest is detected before any external command runs. After that the
//! chain is strictly sequential and stops at the first failing step; edits
//! already made stay on disk.

use std::path::Path;

use tracing::{debug, instrument};

use crate::chain::external_step;
use crate::core::protocol::{ArtifactState, StateTrail};
use crate::core::types::{ReconcileResult, RuleFailure, RunOutcome};
use crate::guard::InvocationGuard;
use crate::io::config::EnvsyncConfig;
use crate::io::paths::ProjectPaths;
use crate::io::tools::{CacheInvalidator, PackageManager, PackageOp, ToolRunner};
use crate::manifest_scripts::{ManifestReconciler, load_manifest};
use crate::report::Report;

pub const COMMAND: &str = "fix:composer";

#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_fix_composer<R: ToolRunner + ?Sized>(
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
    if let Err(err) = load_manifest(&paths.manifest_path) {
        report.error(format!("{err}; aborting"));
        let mut trail = StateTrail::default();
        trail.advance(ArtifactState::Failed(err.kind()));
        let failure = RuleFailure::from_error(paths.manifest_path.display().to_string(), &err);
        let result =
            ReconcileResult::finish(&paths.manifest_path, true, &trail, false, vec![failure]);
        return RunOutcome::failed(vec![result], Vec::new());
    }

    let cache = CacheInvalidator::new(tools, root, &cfg.tools);
    for op in &cfg.upgrade.cache_clear {
        let label = format!("clearing {}", op.label());
        if let Err(failure) = external_step(report, &label, || cache.clear(*op)) {
            return RunOutcome::failed(Vec::new(), vec![failure]);
        }
    }

    let desired = cfg.restore_state();
    let manifest =
        ManifestReconciler::new(&desired.scripts).reconcile(&paths.manifest_path, report);
    if !manifest.is_success() {
        return RunOutcome::failed(vec![manifest], Vec::new());
    }
    let artifacts = vec![manifest];

    let packages = PackageManager::new(tools, root, &cfg.tools);
    let mut steps = Vec::new();
    if cfg.upgrade.install_before_update && !paths.lock_marker.exists() {
        debug!(marker = %paths.lock_marker.display(), "dependencies not installed yet");
        steps.push(PackageOp::Install);
    }
    steps.push(PackageOp::Update);
    for op in steps {
        if let Err(failure) = external_step(report, op.label(), || packages.run(op)) {
            return RunOutcome::failed(artifacts, vec![failure]);
        }
    }

    if cfg.upgrade.refresh_node && paths.node_modules.is_dir() {
        if let Err(failure) = refresh_node(&packages, report) {
            return RunOutcome::failed(artifacts, vec![failure]);
        }
    } else {
        debug!(dir = %paths.node_modules.display(), "skipping node packages");
    }

    let label = PackageOp::RefreshAutoload.label();
    if let Err(failure) =
        external_step(report, label, || packages.run(PackageOp::RefreshAutoload))
    {
        return RunOutcome::failed(artifacts, vec![failure]);
    }

    report.success("dependencies refreshed");
    RunOutcome::completed(artifacts)
}

fn refresh_node<R: ToolRunner + ?Sized>(
    packages: &PackageManager<'_, R>,
    report: &mut Report,
) -> Result<(), RuleFailure> {
    let mut outdated = false;
    external_step(report, PackageOp::ListOutdated.label(), || {
        outdated = packages.list_outdated()?;
        Ok(())
    })?;
    if !outdated {
        report.info("node packages are up to date");
        return Ok(());
    }
    external_step(report, PackageOp::UpdateNode.label(), || {
        packages.run(PackageOp::UpdateNode)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::ScriptEntry;
    use crate::core::rules::FieldPath;
    use crate::core::types::{ErrorKind, RunStatus};
    use crate::report::StatusLevel;
    use crate::test_support::{FRESH_MANIFEST, ScriptedToolRunner, TestProject};

    const CACHE_CLEARS: [&str; 4] = [
        "php artisan config:clear",
        "php artisan cache:clear",
        "php artisan route:clear",
        "php artisan view:clear",
    ];

    fn run(project: &TestProject, runner: &ScriptedToolRunner) -> (RunOutcome, Report) {
        let mut report = Report::new();
        let outcome = run_fix_composer(
            project.root(),
            &EnvsyncConfig::default(),
            &InvocationGuard::new(),
            runner,
            &mut report,
        );
        (outcome, report)
    }

    fn calls_after_caches(runner: &ScriptedToolRunner) -> Vec<String> {
        let calls = runner.calls();
        assert_eq!(calls[..4], CACHE_CLEARS);
        calls[4..].to_vec()
    }

    #[test]
    fn fresh_checkout_installs_then_updates() {
        let project = TestProject::new();
        let runner = ScriptedToolRunner::new();

        let (outcome, report) = run(&project, &runner);

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(
            calls_after_caches(&runner),
            vec!["composer install", "composer update", "composer dump-autoload"]
        );
        let doc = load_manifest(&project.path("composer.json")).expect("manifest");
        let dev = doc
            .script(&FieldPath::from_segments(&["scripts", "dev"]))
            .expect("typed");
        assert!(matches!(dev, Some(ScriptEntry::Sequence(ref steps)) if steps.len() == 2));
        assert!(report.contains(StatusLevel::Success, "dependencies refreshed"));
    }

    #[test]
    fn installed_project_skips_install_and_refreshes_outdated_node_packages() {
        let project = TestProject::new();
        project.write("vendor/autoload.php", "<?php\n");
        project.write("node_modules/.package-lock.json", "{}\n");
        let runner = ScriptedToolRunner::new().responding(
            "npm outdated",
            false,
            "Package  Current  Wanted\nvite  5.0.0  5.4.0\n",
        );

        let (outcome, _) = run(&project, &runner);

        assert!(outcome.is_success());
        assert_eq!(
            calls_after_caches(&runner),
            vec![
                "composer update",
                "npm outdated",
                "npm update --no-save",
                "composer dump-autoload",
            ]
        );
    }

    #[test]
    fn node_update_is_skipped_when_nothing_is_outdated() {
        let project = TestProject::new();
        project.write("vendor/autoload.php", "<?php\n");
        project.write("node_modules/.package-lock.json", "{}\n");
        let runner = ScriptedToolRunner::new();

        let (_, report) = run(&project, &runner);

        assert!(!runner.calls().contains(&"npm update --no-save".to_string()));
        assert!(report.contains(StatusLevel::Info, "node packages are up to date"));
    }

    #[test]
    fn failed_update_stops_before_autoload() {
        let project = TestProject::new();
        project.write("vendor/autoload.php", "<?php\n");
        let runner = ScriptedToolRunner::new().failing("composer update");

        let (outcome, report) = run(&project, &runner);

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(calls_after_caches(&runner), vec!["composer update"]);
        assert_eq!(outcome.failures[0].kind, ErrorKind::ExternalCallFailed);
        assert!(report.contains(StatusLevel::Error, "composer update"));
        assert_ne!(project.read("composer.json"), FRESH_MANIFEST, "restore is kept");
    }

    #[test]
    fn unrunnable_tool_is_an_external_call_failure() {
        let project = TestProject::new();
        let runner = ScriptedToolRunner::new().unrunnable("php artisan config:clear");

        let (outcome, _) = run(&project, &runner);

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(runner.calls(), vec!["php artisan config:clear"]);
        assert_eq!(project.read("composer.json"), FRESH_MANIFEST);
    }

    #[test]
    fn missing_manifest_aborts_before_any_command() {
        let project = TestProject::new();
        project.remove("composer.json");
        let runner = ScriptedToolRunner::new();

        let (outcome, _) = run(&project, &runner);

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(runner.calls().is_empty());
        assert!(outcome.artifacts[0].has_failure(ErrorKind::ArtifactMissing));
        assert_eq!(
            outcome.artifacts[0].state,
            ArtifactState::Failed(ErrorKind::ArtifactMissing)
        );
    }
}

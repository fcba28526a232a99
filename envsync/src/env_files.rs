//! Key/value reconciliation for `.env`-style files.
//!
//! Each target goes through Detect → Apply → Verify on its own. A missing or
//! failing target is recorded and the next target is still processed.

use std::path::Path;

use tracing::debug;

use crate::core::env_patch::{apply_rules, is_satisfied};
use crate::core::protocol::{ArtifactState, StateTrail};
use crate::core::rules::EnvRule;
use crate::core::types::{ErrorKind, ReconcileError, ReconcileResult, RuleFailure, RuleOutcome};
use crate::io::artifact::{read_artifact, write_artifact};
use crate::io::paths::EnvTarget;
use crate::report::Report;

pub struct EnvFileReconciler<'a> {
    rules: &'a [EnvRule],
}

impl<'a> EnvFileReconciler<'a> {
    pub fn new(rules: &'a [EnvRule]) -> Self {
        Self { rules }
    }

    /// True when every target exists and already holds every replacement.
    pub fn is_satisfied(&self, targets: &[EnvTarget]) -> bool {
        targets.iter().all(|target| {
            read_artifact(&target.path)
                .map(|content| is_satisfied(&content, self.rules))
                .unwrap_or(false)
        })
    }

    /// Reconcile every target in order, short-circuiting when all are satisfied.
    pub fn reconcile_all(
        &self,
        targets: &[EnvTarget],
        report: &mut Report,
    ) -> Vec<ReconcileResult> {
        if self.is_satisfied(targets) {
            report.info("env files are already up to date");
            return targets
                .iter()
                .map(|target| {
                    let mut trail = StateTrail::default();
                    trail.advance(ArtifactState::Detected);
                    trail.advance(ArtifactState::Skipped);
                    ReconcileResult::finish(
                        &target.path,
                        target.required,
                        &trail,
                        false,
                        Vec::new(),
                    )
                })
                .collect();
        }
        targets
            .iter()
            .map(|target| self.reconcile(target, report))
            .collect()
    }

    pub fn reconcile(&self, target: &EnvTarget, report: &mut Report) -> ReconcileResult {
        let path = target.path.as_path();
        let shown = path.display();
        let mut trail = StateTrail::default();
        let finish = |trail: &StateTrail, applied: bool, failures: Vec<RuleFailure>| {
            ReconcileResult::finish(path, target.required, trail, applied, failures)
        };

        let content = match read_artifact(path) {
            Ok(content) => content,
            Err(err) => {
                trail.advance(ArtifactState::Failed(err.kind()));
                if target.required {
                    report.error(format!("{err}"));
                } else {
                    report.warn(format!("{err} (optional, skipping)"));
                }
                let failure = RuleFailure::from_error(shown.to_string(), &err);
                return finish(&trail, false, vec![failure]);
            }
        };
        trail.advance(ArtifactState::Detected);

        if is_satisfied(&content, self.rules) {
            trail.advance(ArtifactState::Skipped);
            report.info(format!("{shown} is already up to date"));
            return finish(&trail, false, Vec::new());
        }

        trail.advance(ArtifactState::Applying);
        let patch = apply_rules(&content, self.rules);
        for (rule, outcome) in self.rules.iter().zip(&patch.outcomes) {
            match outcome {
                RuleOutcome::Replaced { count } => {
                    debug!(path = %shown, rule = rule.key(), count, "replaced");
                }
                RuleOutcome::SearchAbsent => report.warn(format!(
                    "{shown}: '{}' not found, leaving it unchanged",
                    rule.search
                )),
                RuleOutcome::AlreadySatisfied | RuleOutcome::Overwritten => {}
            }
        }

        let applied = patch.changed();
        if applied && let Err(err) = write_artifact(path, &patch.content) {
            trail.advance(ArtifactState::Failed(err.kind()));
            report.error(format!("{err}"));
            let failure = RuleFailure::from_error(shown.to_string(), &err);
            return finish(&trail, false, vec![failure]);
        }
        trail.advance(ArtifactState::Applied);

        let failures = self.verify(path, &patch.outcomes);
        if failures.is_empty() {
            trail.advance(ArtifactState::Verified);
            let satisfied = patch
                .outcomes
                .iter()
                .filter(|outcome| **outcome == RuleOutcome::AlreadySatisfied)
                .count();
            if applied {
                report.success(format!("updated {shown}"));
            } else if satisfied > 0 {
                report.info(format!(
                    "{shown}: {satisfied} rule(s) already satisfied, nothing else to replace"
                ));
            } else {
                report.info(format!("{shown}: no search literal found, nothing to replace"));
            }
        } else {
            trail.advance(ArtifactState::VerificationFailed);
            for failure in &failures {
                report.error(format!("failed to update {shown}: {}", failure.reason));
            }
        }
        finish(&trail, applied, failures)
    }

    /// Re-read `path` and confirm each applicable rule's replacement is present.
    fn verify(&self, path: &Path, outcomes: &[RuleOutcome]) -> Vec<RuleFailure> {
        let persisted = match read_artifact(path) {
            Ok(content) => content,
            Err(err) => {
                let failure = RuleFailure::new(
                    path.display().to_string(),
                    ErrorKind::VerificationFailed,
                    err.to_string(),
                );
                return vec![failure];
            }
        };
        self.rules
            .iter()
            .zip(outcomes)
            .filter(|(rule, outcome)| {
                outcome.is_verifiable() && !persisted.contains(&rule.replace)
            })
            .map(|(rule, _)| {
                let err = ReconcileError::VerificationFailed {
                    path: path.to_path_buf(),
                    expected: rule.replace.clone(),
                };
                RuleFailure::from_error(rule.key(), &err)
            })
            .collect()
    }
}

//! Script reconciliation for the dependency manifest (`composer.json`).
//!
//! Detect decodes the manifest; a missing or malformed manifest stops the pass
//! before anything is written. Apply overwrites each configured field with its
//! desired sequence, and Verify decodes the persisted file again and compares
//! structurally before checking marker literals in the raw text.

use std::path::Path;

use tracing::debug;

use crate::core::manifest::{ManifestDocument, ManifestError};
use crate::core::protocol::{ArtifactState, StateTrail};
use crate::core::rules::ScriptRule;
use crate::core::types::{ErrorKind, ReconcileError, ReconcileResult, RuleFailure};
use crate::io::artifact::{read_artifact, write_artifact};
use crate::report::Report;

/// Read and decode the manifest, mapping decode errors to `ArtifactMalformed`.
pub fn load_manifest(path: &Path) -> Result<ManifestDocument, ReconcileError> {
    let raw = read_artifact(path)?;
    ManifestDocument::decode(&raw).map_err(|err| malformed(path, &err))
}

fn malformed(path: &Path, err: &ManifestError) -> ReconcileError {
    ReconcileError::ArtifactMalformed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

pub struct ManifestReconciler<'a> {
    rules: &'a [ScriptRule],
}

impl<'a> ManifestReconciler<'a> {
    pub fn new(rules: &'a [ScriptRule]) -> Self {
        Self { rules }
    }

    /// True when the manifest decodes and every field already deep-equals its rule.
    pub fn is_satisfied(&self, path: &Path) -> bool {
        load_manifest(path)
            .map(|doc| self.fields_match(&doc))
            .unwrap_or(false)
    }

    fn fields_match(&self, doc: &ManifestDocument) -> bool {
        self.rules
            .iter()
            .all(|rule| doc.field_matches(&rule.field, &rule.sequence))
    }

    pub fn reconcile(&self, path: &Path, report: &mut Report) -> ReconcileResult {
        let shown = path.display();
        let mut trail = StateTrail::default();
        let fail = |trail: &mut StateTrail, report: &mut Report, err: ReconcileError| {
            trail.advance(ArtifactState::Failed(err.kind()));
            report.error(format!("{err}; aborting"));
            let failure = RuleFailure::from_error(path.display().to_string(), &err);
            ReconcileResult::finish(path, true, trail, false, vec![failure])
        };

        let mut doc = match load_manifest(path) {
            Ok(doc) => doc,
            Err(err) => return fail(&mut trail, report, err),
        };
        trail.advance(ArtifactState::Detected);

        if self.fields_match(&doc) {
            trail.advance(ArtifactState::Skipped);
            report.info(format!("{shown} scripts are already up to date"));
            return ReconcileResult::finish(path, true, &trail, false, Vec::new());
        }

        trail.advance(ArtifactState::Applying);
        for rule in self.rules {
            if let Err(err) = doc.set_sequence(&rule.field, &rule.sequence) {
                return fail(&mut trail, report, malformed(path, &err));
            }
            debug!(path = %shown, field = %rule.field, "overwrote field");
        }

        let encoded = match doc.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                let err = ReconcileError::Encode {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                };
                return fail(&mut trail, report, err);
            }
        };
        if let Err(err) = write_artifact(path, &encoded) {
            return fail(&mut trail, report, err);
        }
        trail.advance(ArtifactState::Applied);

        let failures = self.verify(path);
        if failures.is_empty() {
            trail.advance(ArtifactState::Verified);
            let fields: Vec<String> =
                self.rules.iter().map(|rule| rule.field.to_string()).collect();
            report.success(format!("updated {shown} scripts: {}", fields.join(", ")));
        } else {
            trail.advance(ArtifactState::VerificationFailed);
            for failure in &failures {
                report.error(format!("failed to update {shown}: {}", failure.reason));
            }
        }
        ReconcileResult::finish(path, true, &trail, true, failures)
    }

    /// Decode the persisted manifest and compare each field, then check markers.
    fn verify(&self, path: &Path) -> Vec<RuleFailure> {
        let raw = match read_artifact(path) {
            Ok(raw) => raw,
            Err(err) => return vec![unreadable(path, &err.to_string())],
        };
        let doc = match ManifestDocument::decode(&raw) {
            Ok(doc) => doc,
            Err(err) => return vec![unreadable(path, &err.to_string())],
        };

        let mut failures = Vec::new();
        for rule in self.rules {
            let field = rule.field.to_string();
            if !doc.field_matches(&rule.field, &rule.sequence) {
                let err = ReconcileError::VerificationFailed {
                    path: path.to_path_buf(),
                    expected: format!("the desired {field} sequence"),
                };
                failures.push(RuleFailure::from_error(field.clone(), &err));
            }
            for marker in rule.markers.iter().filter(|m| !raw.contains(m.as_str())) {
                let err = ReconcileError::VerificationFailed {
                    path: path.to_path_buf(),
                    expected: format!("'{marker}'"),
                };
                failures.push(RuleFailure::from_error(field.clone(), &err));
            }
        }
        failures
    }
}

fn unreadable(path: &Path, reason: &str) -> RuleFailure {
    RuleFailure::new(
        path.display().to_string(),
        ErrorKind::VerificationFailed,
        format!("re-read of {} failed: {reason}", path.display()),
    )
}

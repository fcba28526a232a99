//! `check`: report drift from the `setup:db` state without writing anything.
//!
//! Drift is exactly what keeps `setup:db` from short-circuiting, so a clean
//! check means the next `setup:db` run is a no-op.

use std::path::{Path, PathBuf};

use crate::core::env_patch::missing_replacements;
use crate::core::types::ReconcileError;
use crate::io::artifact::read_artifact;
use crate::io::config::EnvsyncConfig;
use crate::io::paths::ProjectPaths;
use crate::manifest_scripts::load_manifest;
use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    Missing,
    Malformed,
    /// The artifact is readable but a desired value is not in place.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub artifact: PathBuf,
    pub kind: DriftKind,
    pub detail: String,
}

/// Inspect every artifact and return what differs from the desired state.
pub fn check_drift(root: &Path, cfg: &EnvsyncConfig, report: &mut Report) -> Vec<Drift> {
    let paths = ProjectPaths::new(root, cfg);
    let desired = cfg.setup_state();
    let mut drift = Vec::new();

    for target in &paths.env_targets {
        let shown = target.path.display();
        match read_artifact(&target.path) {
            Ok(content) => {
                let missing = missing_replacements(&content, &desired.env);
                if missing.is_empty() {
                    report.success(format!("{shown} is up to date"));
                }
                for rule in missing {
                    report.warn(format!("{shown}: '{}' is not set", rule.replace));
                    drift.push(Drift {
                        artifact: target.path.clone(),
                        kind: DriftKind::Pending,
                        detail: rule.replace.clone(),
                    });
                }
            }
            Err(err) => {
                report.warn(err.to_string());
                drift.push(from_error(target.path.clone(), &err));
            }
        }
    }

    let manifest_path = &paths.manifest_path;
    let shown = manifest_path.display();
    match load_manifest(manifest_path) {
        Ok(doc) => {
            let pending: Vec<String> = desired
                .scripts
                .iter()
                .filter(|rule| !doc.field_matches(&rule.field, &rule.sequence))
                .map(|rule| rule.field.to_string())
                .collect();
            if pending.is_empty() {
                report.success(format!("{shown} scripts are up to date"));
            }
            for field in pending {
                report.warn(format!("{shown}: {field} differs from the desired scripts"));
                drift.push(Drift {
                    artifact: manifest_path.clone(),
                    kind: DriftKind::Pending,
                    detail: field,
                });
            }
        }
        Err(err) => {
            report.error(err.to_string());
            drift.push(from_error(manifest_path.clone(), &err));
        }
    }

    drift
}

fn from_error(artifact: PathBuf, err: &ReconcileError) -> Drift {
    let kind = match err {
        ReconcileError::ArtifactMissing { .. } => DriftKind::Missing,
        _ => DriftKind::Malformed,
    };
    Drift {
        artifact,
        kind,
        detail: err.to_string(),
    }
}

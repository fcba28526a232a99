//! Shared deterministic types for reconciliation results.
//!
//! These types define the contract between the reconcilers, the orchestration
//! commands and the CLI. They carry no I/O handles so they can be compared in
//! tests and rendered into status lines.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::protocol::{ArtifactState, StateTrail};

/// Classification of everything that can go wrong during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArtifactMissing,
    ArtifactMalformed,
    WriteFailed,
    VerificationFailed,
    ExternalCallFailed,
    ReentrantInvocation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ArtifactMissing => "artifact missing",
            ErrorKind::ArtifactMalformed => "artifact malformed",
            ErrorKind::WriteFailed => "write failed",
            ErrorKind::VerificationFailed => "verification failed",
            ErrorKind::ExternalCallFailed => "external call failed",
            ErrorKind::ReentrantInvocation => "reentrant invocation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed errors raised inside a single reconciliation pass.
///
/// Reconcilers convert these into [`RuleFailure`] entries at the artifact
/// boundary; orchestration decides whether a kind is fatal.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{} not found", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("{} is malformed: {reason}", path.display())]
    ArtifactMalformed { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("{} does not hold {expected}", path.display())]
    VerificationFailed { path: PathBuf, expected: String },

    #[error("command failed: {command}")]
    ExternalCallFailed { command: String },

    #[error("{command} is already running")]
    ReentrantInvocation { command: String },
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            ReconcileError::ArtifactMalformed { .. } => ErrorKind::ArtifactMalformed,
            // Bytes that do not decode as text are a malformed artifact.
            ReconcileError::ReadFailed { source, .. }
                if source.kind() == std::io::ErrorKind::InvalidData =>
            {
                ErrorKind::ArtifactMalformed
            }
            // Any other unreadable or unencodable artifact never reaches the
            // write step, so it surfaces as a failed persist.
            ReconcileError::WriteFailed { .. }
            | ReconcileError::ReadFailed { .. }
            | ReconcileError::Encode { .. } => ErrorKind::WriteFailed,
            ReconcileError::VerificationFailed { .. } => ErrorKind::VerificationFailed,
            ReconcileError::ExternalCallFailed { .. } => ErrorKind::ExternalCallFailed,
            ReconcileError::ReentrantInvocation { .. } => ErrorKind::ReentrantInvocation,
        }
    }
}

/// One failed rule (or whole artifact, when `rule` names the artifact).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RuleFailure {
    pub fn new(rule: impl Into<String>, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            kind,
            reason: reason.into(),
        }
    }

    pub fn from_error(rule: impl Into<String>, err: &ReconcileError) -> Self {
        Self::new(rule, err.kind(), err.to_string())
    }
}

/// What the apply phase did with a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The search literal was found and replaced `count` times.
    Replaced { count: usize },
    /// The desired value was already present.
    AlreadySatisfied,
    /// Neither the search literal nor the desired value is present.
    SearchAbsent,
    /// The field was overwritten with the desired value.
    Overwritten,
}

impl RuleOutcome {
    /// Whether the rule's desired value must be present after the pass.
    pub fn is_verifiable(self) -> bool {
        !matches!(self, RuleOutcome::SearchAbsent)
    }
}

/// Terminal report for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub artifact: PathBuf,
    /// Whether a failure on this artifact fails the whole run.
    pub required: bool,
    pub state: ArtifactState,
    /// Bytes on disk were rewritten during this pass.
    pub applied: bool,
    /// The post-state was confirmed from a fresh read (or needed no write).
    pub verified: bool,
    pub failures: Vec<RuleFailure>,
}

impl ReconcileResult {
    /// Close out an artifact at whatever terminal state `trail` reached.
    pub fn finish(
        artifact: impl Into<PathBuf>,
        required: bool,
        trail: &StateTrail,
        applied: bool,
        failures: Vec<RuleFailure>,
    ) -> Self {
        let state = trail.current();
        debug_assert!(state.is_terminal(), "result built from {state:?}");
        Self {
            artifact: artifact.into(),
            required,
            state,
            applied,
            verified: state.is_success(),
            failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success() && self.failures.is_empty()
    }

    pub fn has_failure(&self, kind: ErrorKind) -> bool {
        self.failures.iter().any(|failure| failure.kind == kind)
    }

    /// A failed artifact stops the run unless it is optional and merely absent.
    pub fn blocks_run(&self) -> bool {
        if self.is_success() {
            return false;
        }
        self.required || self.state != ArtifactState::Failed(ErrorKind::ArtifactMissing)
    }
}

/// Overall status of one orchestration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Changes were applied and verified, follow-up calls succeeded.
    Completed,
    /// Everything already matched; nothing was written or invoked.
    UpToDate,
    /// A re-entrant call was refused.
    Skipped,
    Failed,
}

/// Everything a command produced, for the CLI and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub artifacts: Vec<ReconcileResult>,
    /// Failures not tied to one artifact (external calls, re-entrancy).
    pub failures: Vec<RuleFailure>,
}

impl RunOutcome {
    pub fn completed(artifacts: Vec<ReconcileResult>) -> Self {
        Self {
            status: RunStatus::Completed,
            artifacts,
            failures: Vec::new(),
        }
    }

    pub fn up_to_date() -> Self {
        Self {
            status: RunStatus::UpToDate,
            artifacts: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failed(artifacts: Vec<ReconcileResult>, failures: Vec<RuleFailure>) -> Self {
        Self {
            status: RunStatus::Failed,
            artifacts,
            failures,
        }
    }

    pub fn skipped(command: &str) -> Self {
        Self {
            status: RunStatus::Skipped,
            artifacts: Vec::new(),
            failures: vec![RuleFailure::from_error(
                command,
                &ReconcileError::ReentrantInvocation {
                    command: command.to_string(),
                },
            )],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::UpToDate)
    }

    pub fn artifact(&self, path: &std::path::Path) -> Option<&ReconcileResult> {
        self.artifacts.iter().find(|result| result.artifact == path)
    }

    /// Every failure, artifact-scoped ones first.
    pub fn all_failures(&self) -> impl Iterator<Item = &RuleFailure> {
        self.artifacts
            .iter()
            .flat_map(|result| result.failures.iter())
            .chain(self.failures.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn read_failed(kind: io::ErrorKind) -> ReconcileError {
        ReconcileError::ReadFailed {
            path: PathBuf::from(".env"),
            source: io::Error::new(kind, "boom"),
        }
    }

    #[test]
    fn undecodable_read_is_malformed() {
        assert_eq!(
            read_failed(io::ErrorKind::InvalidData).kind(),
            ErrorKind::ArtifactMalformed
        );
        assert_eq!(
            read_failed(io::ErrorKind::PermissionDenied).kind(),
            ErrorKind::WriteFailed
        );
    }

    #[test]
    fn missing_optional_artifact_does_not_block() {
        let mut trail = StateTrail::default();
        trail.advance(ArtifactState::Failed(ErrorKind::ArtifactMissing));
        let optional = ReconcileResult::finish(".env.example", false, &trail, false, Vec::new());
        let required = ReconcileResult::finish(".env", true, &trail, false, Vec::new());
        assert!(!optional.blocks_run());
        assert!(required.blocks_run());
    }
}

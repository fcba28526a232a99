//! Per-artifact Detect → Apply → Verify state machine.
//!
//! ```text
//! NotStarted -> Detected -> Skipped
//!                        -> Applying -> Applied -> Verified
//!                                              -> VerificationFailed
//! NotStarted | Detected | Applying -> Failed(kind)
//! ```
//!
//! No state is retried. Terminal states are `Skipped`, `Verified`,
//! `VerificationFailed` and `Failed`.

use super::types::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    NotStarted,
    Detected,
    /// Detect found the desired state already in place.
    Skipped,
    Applying,
    Applied,
    Verified,
    VerificationFailed,
    /// Detect or apply stopped with the given kind (missing, malformed, write).
    Failed(ErrorKind),
}

impl ArtifactState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ArtifactState::Skipped
                | ArtifactState::Verified
                | ArtifactState::VerificationFailed
                | ArtifactState::Failed(_)
        )
    }

    /// Only `Skipped` and `Verified` count as a passing artifact.
    pub fn is_success(self) -> bool {
        matches!(self, ArtifactState::Skipped | ArtifactState::Verified)
    }

    pub fn can_transition_to(self, next: ArtifactState) -> bool {
        use ArtifactState::{
            Applied, Applying, Detected, Failed, NotStarted, Skipped, VerificationFailed, Verified,
        };
        matches!(
            (self, next),
            (NotStarted, Detected)
                | (NotStarted, Failed(_))
                | (Detected, Skipped)
                | (Detected, Applying)
                | (Detected, Failed(_))
                | (Applying, Applied)
                | (Applying, Failed(_))
                | (Applied, Verified)
                | (Applied, VerificationFailed)
        )
    }
}

/// Ordered record of the states one artifact passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    states: Vec<ArtifactState>,
}

impl Default for StateTrail {
    fn default() -> Self {
        Self {
            states: vec![ArtifactState::NotStarted],
        }
    }
}

impl StateTrail {
    pub fn current(&self) -> ArtifactState {
        self.states
            .last()
            .copied()
            .unwrap_or(ArtifactState::NotStarted)
    }

    /// Move to `next`. Illegal transitions are a programming error.
    pub fn advance(&mut self, next: ArtifactState) -> ArtifactState {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {current:?} -> {next:?}"
        );
        self.states.push(next);
        next
    }

    pub fn states(&self) -> &[ArtifactState] {
        &self.states
    }
}

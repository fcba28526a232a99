//! Stable exit codes for envsync CLI commands.

/// Command succeeded (including "already up to date" and a skipped nested call).
pub const OK: i32 = 0;
/// Command failed: bad config, unreadable artifact, failed verification or tool call.
pub const FAILED: i32 = 1;
/// `envsync check` found artifacts that differ from the desired state.
pub const DRIFT: i32 = 2;

//! Re-entrancy guard for orchestration commands.
//!
//! The guard is an explicit object owned by the process invocation and passed
//! to each command. While one command holds the token, any nested command
//! sharing the guard is refused instead of recursing.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct InvocationGuard {
    active: Cell<bool>,
}

/// Held for the duration of one orchestration call; releases on drop.
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a InvocationGuard,
}

impl InvocationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if a command is already running under this guard.
    pub fn try_enter(&self) -> Option<GuardToken<'_>> {
        if self.active.replace(true) {
            return None;
        }
        Some(GuardToken { guard: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.active.set(false);
    }
}

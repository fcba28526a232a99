//! Fail-fast sequencing of external calls after reconciliation.

use crate::core::types::{ReconcileError, RuleFailure};
use crate::report::Report;

/// Run one external step, reporting progress and converting failure.
///
/// The caller stops the chain on `Err`; nothing is retried.
pub fn external_step<F>(report: &mut Report, label: &str, call: F) -> Result<(), RuleFailure>
where
    F: FnOnce() -> Result<(), ReconcileError>,
{
    report.info(format!("{label}..."));
    call().map_err(|err| {
        report.error(format!("{label} failed: {err}"));
        RuleFailure::from_error(label, &err)
    })
}

//! Idempotent environment reconciliation for Laravel-style projects.
//!
//! Two commands converge on-disk artifacts to a declared desired state and then
//! run follow-up tooling:
//!
//! - `setup:db` ([`setup_db`]) switches `.env` files to database-backed drivers
//!   and writes the manifest's setup scripts.
//! - `fix:composer` ([`fix_composer`]) restores the manifest's dev script and
//!   refreshes PHP and Node dependencies.
//!
//! The crate keeps a strict split:
//!
//! - **[`core`]**: Pure logic (rules, text patches, manifest model, state
//!   protocol). No I/O.
//! - **[`io`]**: Filesystem, configuration and subprocess adapters.
//!
//! Every artifact goes through Detect → Apply → Verify ([`env_files`],
//! [`manifest_scripts`]); the orchestrators only sequence those passes and the
//! external calls behind an [`guard::InvocationGuard`].

pub mod chain;
pub mod check;
pub mod core;
pub mod env_files;
pub mod exit_codes;
pub mod fix_composer;
pub mod guard;
pub mod io;
pub mod logging;
pub mod manifest_scripts;
pub mod report;
pub mod setup_db;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

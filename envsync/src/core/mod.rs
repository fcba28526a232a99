//! Deterministic, pure logic shared by the reconcilers.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and documents and return deterministic outputs suitable for tests.

pub mod env_patch;
pub mod manifest;
pub mod protocol;
pub mod rules;
pub mod types;

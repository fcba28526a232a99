//! I/O helpers for envsync commands.

pub mod artifact;
pub mod config;
pub mod init;
pub mod paths;
pub mod process;
pub mod tools;

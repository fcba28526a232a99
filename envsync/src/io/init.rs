//! `envsync init`: write the default configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use super::config::{EnvsyncConfig, write_config};

/// Options for `init_config`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config file.
    pub force: bool,
}

/// Write the default config to `path`.
///
/// Fails if the file already exists unless `options.force` is set.
pub fn init_config(path: &Path, options: &InitOptions) -> Result<PathBuf> {
    if path.exists() && !options.force {
        return Err(anyhow!(
            "envsync init: {} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if path.is_dir() {
        return Err(anyhow!(
            "envsync init: {} exists but is a directory",
            path.display()
        ));
    }
    write_config(path, &EnvsyncConfig::default())?;
    Ok(path.to_path_buf())
}

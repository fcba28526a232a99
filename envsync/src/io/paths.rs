//! Resolved artifact locations for one project root.

use std::path::{Path, PathBuf};

use crate::io::config::{CONFIG_FILE_NAME, EnvsyncConfig};

/// One env-style file the key/value reconciler should converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTarget {
    pub path: PathBuf,
    pub required: bool,
}

/// All canonical paths for a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub env_targets: Vec<EnvTarget>,
    pub lock_marker: PathBuf,
    pub node_modules: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, cfg: &EnvsyncConfig) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(&cfg.manifest.path),
            env_targets: cfg
                .env
                .files
                .iter()
                .map(|file| EnvTarget {
                    path: root.join(&file.path),
                    required: file.required,
                })
                .collect(),
            lock_marker: root.join(&cfg.upgrade.lock_marker),
            node_modules: root.join(&cfg.upgrade.node_modules),
            root,
        }
    }
}

/// Default config location for a project root.
pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_to_root() {
        let paths = ProjectPaths::new("/srv/app", &EnvsyncConfig::default());
        assert_eq!(paths.manifest_path, PathBuf::from("/srv/app/composer.json"));
        assert_eq!(
            paths.env_targets,
            vec![
                EnvTarget {
                    path: PathBuf::from("/srv/app/.env"),
                    required: true,
                },
                EnvTarget {
                    path: PathBuf::from("/srv/app/.env.example"),
                    required: false,
                },
            ]
        );
        assert_eq!(
            paths.lock_marker,
            PathBuf::from("/srv/app/vendor/autoload.php")
        );
    }
}

//! Project configuration stored in `envsync.toml` at the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::rules::{DesiredState, EnvRule, FieldPath, ScriptRule};
use crate::io::tools::CacheOp;

pub const CONFIG_FILE_NAME: &str = "envsync.toml";

/// Envsync configuration (TOML).
///
/// Every section is optional; missing fields fall back to the database-driven
/// Laravel setup this tool was written for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvsyncConfig {
    pub env: EnvConfig,
    pub manifest: ManifestConfig,
    pub setup: SetupPolicy,
    pub upgrade: UpgradePolicy,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvConfig {
    pub files: Vec<EnvFileConfig>,
    pub rules: Vec<EnvRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvFileConfig {
    /// Relative to the project root.
    pub path: PathBuf,
    /// A missing required file fails the run; a missing optional one is reported and skipped.
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: PathBuf,
    /// Scripts converged by `setup:db`.
    pub setup_scripts: Vec<ScriptRule>,
    /// Scripts restored by `fix:composer`.
    pub restore_scripts: Vec<ScriptRule>,
}

/// Follow-up calls made by `setup:db` after a successful reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupPolicy {
    pub cache_clear: Vec<CacheOp>,
    pub refresh_autoload: bool,
}

/// Dependency refresh performed by `fix:composer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpgradePolicy {
    /// Cache ops run before the manifest is touched.
    pub cache_clear: Vec<CacheOp>,
    /// Run `install` before `update` when `lock_marker` is absent.
    pub install_before_update: bool,
    pub lock_marker: PathBuf,
    pub node_modules: PathBuf,
    pub refresh_node: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Command prefix for framework cache commands.
    pub artisan: Vec<String>,
    pub composer: Vec<String>,
    pub npm: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn script_rule(field: &[&str], sequence: &[&str], markers: &[&str]) -> ScriptRule {
    ScriptRule {
        field: FieldPath::from_segments(field),
        sequence: strings(sequence),
        markers: strings(markers),
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            files: vec![
                EnvFileConfig {
                    path: PathBuf::from(".env"),
                    required: true,
                },
                EnvFileConfig {
                    path: PathBuf::from(".env.example"),
                    required: false,
                },
            ],
            rules: vec![
                EnvRule::new("SESSION_DRIVER=file", "SESSION_DRIVER=database"),
                EnvRule::new("QUEUE_CONNECTION=sync", "QUEUE_CONNECTION=database"),
                EnvRule::new("CACHE_STORE=file", "CACHE_STORE=database"),
            ],
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("composer.json"),
            setup_scripts: vec![
                script_rule(
                    &["scripts", "post-create-project-cmd"],
                    &[
                        "@php artisan key:generate --ansi",
                        "@php -r \"file_exists('database/database.mysql') || touch('database/database.mysql');\"",
                        "@php artisan migrate --graceful --ansi",
                    ],
                    &["php artisan migrate"],
                ),
                script_rule(
                    &["scripts", "dev"],
                    &[
                        "Composer\\Config::disableProcessTimeout",
                        "npx concurrently -c \"#93c5fd,#c4b5fd,#fdba74\" \"php artisan serve\" \"php artisan queue:listen --tries=1\" \"npm run dev\" --names='server,queue,vite'",
                    ],
                    &["npx concurrently"],
                ),
            ],
            restore_scripts: vec![script_rule(
                &["scripts", "dev"],
                &[
                    "Composer\\Config::disableProcessTimeout",
                    "php artisan serve & php artisan queue:listen --tries=1 & (npm run dev || echo Vite not installed, skipping...) > nul 2>&1",
                ],
                &["php artisan serve"],
            )],
        }
    }
}

impl Default for SetupPolicy {
    fn default() -> Self {
        Self {
            cache_clear: vec![CacheOp::Config, CacheOp::General],
            refresh_autoload: true,
        }
    }
}

impl Default for UpgradePolicy {
    fn default() -> Self {
        Self {
            cache_clear: CacheOp::ALL.to_vec(),
            install_before_update: true,
            lock_marker: PathBuf::from("vendor/autoload.php"),
            node_modules: PathBuf::from("node_modules"),
            refresh_node: true,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            artisan: strings(&["php", "artisan"]),
            composer: strings(&["composer"]),
            npm: strings(&["npm"]),
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl EnvsyncConfig {
    pub fn validate(&self) -> Result<()> {
        for rule in &self.env.rules {
            if rule.search.is_empty() || rule.replace.is_empty() {
                return Err(anyhow!("env.rules entries need non-empty search and replace"));
            }
        }
        for file in &self.env.files {
            if file.path.as_os_str().is_empty() {
                return Err(anyhow!("env.files entries need a path"));
            }
        }
        if self.manifest.path.as_os_str().is_empty() {
            return Err(anyhow!("manifest.path must not be empty"));
        }
        for rule in self
            .manifest
            .setup_scripts
            .iter()
            .chain(&self.manifest.restore_scripts)
        {
            if rule.sequence.is_empty() {
                return Err(anyhow!("script rule '{}' has an empty sequence", rule.field));
            }
        }
        for (name, command) in [
            ("tools.artisan", &self.tools.artisan),
            ("tools.composer", &self.tools.composer),
            ("tools.npm", &self.tools.npm),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("{name} must be a non-empty array"));
            }
        }
        if self.tools.timeout_secs == 0 {
            return Err(anyhow!("tools.timeout_secs must be > 0"));
        }
        if self.tools.output_limit_bytes == 0 {
            return Err(anyhow!("tools.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Desired state for `setup:db`: env rules plus setup scripts.
    pub fn setup_state(&self) -> DesiredState {
        DesiredState {
            env: self.env.rules.clone(),
            scripts: self.manifest.setup_scripts.clone(),
        }
    }

    /// Desired state for `fix:composer`: restore scripts only.
    pub fn restore_state(&self) -> DesiredState {
        DesiredState {
            env: Vec::new(),
            scripts: self.manifest.restore_scripts.clone(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EnvsyncConfig::default()`.
pub fn load_config(path: &Path) -> Result<EnvsyncConfig> {
    if !path.exists() {
        let cfg = EnvsyncConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EnvsyncConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EnvsyncConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

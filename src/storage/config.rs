//! Configuration handling for the scaffold CLI
//!
//! Configuration is stored in `~/.config/scaffold-cli/config.toml` (global).
//! Per-project state lives in the `PROJECT` descriptor instead.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use super::project::{Project, ProjectError};
use crate::external::DEFAULT_PROJECT_VERSIONS;
use crate::plugin::ProjectVersion;

/// Environment variable naming an extra plugin root, searched first
pub const PLUGINS_DIR_ENV: &str = "SCAFFOLD_PLUGINS_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Global user configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Extra plugin roots, searched before the default root
    pub plugin_dirs: Vec<PathBuf>,

    /// Project versions declared by discovered external plugins
    pub external_project_versions: Vec<ProjectVersion>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Loaded configuration plus the project it applies to, if any
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project_root = std::env::current_dir()
            .ok()
            .and_then(|cwd| Project::find_root(&cwd));

        Ok(Self {
            global,
            project_root,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "scaffold", "scaffold-cli")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        Self::load_global_from(&config_dir.join("config.toml"))
    }

    /// Loads global configuration from a file, defaults if missing
    pub fn load_global_from(config_path: &Path) -> Result<GlobalConfig> {
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse global config: {}", config_path.display()))
    }

    /// Plugin roots in search order: `$SCAFFOLD_PLUGINS_DIR`, configured
    /// dirs, then `<config_dir>/plugins`
    pub fn plugin_roots(&self) -> Vec<PathBuf> {
        let env_root = std::env::var_os(PLUGINS_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        self.plugin_roots_with(env_root, Self::global_config_dir())
    }

    fn plugin_roots_with(&self, env_root: Option<PathBuf>, config_dir: Option<PathBuf>) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        roots.extend(env_root);
        roots.extend(self.global.plugin_dirs.iter().cloned());
        roots.extend(config_dir.map(|dir| dir.join("plugins")));
        roots
    }

    /// Project versions for external plugins, falling back to the defaults
    pub fn external_project_versions(&self) -> Vec<ProjectVersion> {
        if self.global.external_project_versions.is_empty() {
            DEFAULT_PROJECT_VERSIONS.to_vec()
        } else {
            self.global.external_project_versions.clone()
        }
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path, ProjectError> {
        self.project_root.as_deref().ok_or(ProjectError::NotInProject)
    }
}

//! External plugin discovery
//!
//! Plugins are discovered from plugin roots with the layout:
//!
//! ```text
//! {root}/
//! └── {name}/
//!     └── {version}/
//!         └── {name}        # executable
//! ```
//!
//! e.g. `~/.config/scaffold-cli/plugins/sample.external.dev/v1/sample.external.dev`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::ExternalPlugin;
use crate::plugin::{key_for, validate_name, ProjectVersion, Version};

/// Project versions external plugins declare unless configured otherwise
pub const DEFAULT_PROJECT_VERSIONS: &[ProjectVersion] = &[ProjectVersion::stable(3)];

/// Information about a discovered plugin executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

impl DiscoveredPlugin {
    pub fn key(&self) -> String {
        key_for(&self.name, self.version)
    }
}

/// Finds external plugins under plugin roots
pub struct PluginDiscovery {
    /// Roots to search, in priority order
    roots: Vec<PathBuf>,

    /// Project versions assigned to discovered plugins
    project_versions: Vec<ProjectVersion>,
}

impl PluginDiscovery {
    /// Creates a discovery with no roots
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            project_versions: DEFAULT_PROJECT_VERSIONS.to_vec(),
        }
    }

    /// Adds a plugin root to search
    pub fn add_root(&mut self, dir: impl Into<PathBuf>) {
        self.roots.push(dir.into());
    }

    /// Sets the project versions discovered plugins declare
    pub fn set_project_versions(&mut self, versions: Vec<ProjectVersion>) {
        self.project_versions = versions;
    }

    /// Scans all roots, first root wins on duplicate keys
    pub fn discover(&self) -> Result<Vec<DiscoveredPlugin>> {
        let mut found: Vec<DiscoveredPlugin> = Vec::new();

        for root in &self.roots {
            for plugin in Self::scan_root(root)? {
                if found.iter().any(|p| p.key() == plugin.key()) {
                    tracing::debug!(key = %plugin.key(), path = %plugin.path.display(), "shadowed external plugin");
                    continue;
                }
                found.push(plugin);
            }
        }

        Ok(found)
    }

    /// Scans and wraps every plugin as an [`ExternalPlugin`]
    pub fn load(&self) -> Result<Vec<ExternalPlugin>> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|p| ExternalPlugin::new(p.name, p.version, p.path, self.project_versions.clone()))
            .collect())
    }

    /// Scans a single root
    fn scan_root(root: &Path) -> Result<Vec<DiscoveredPlugin>> {
        let mut found = Vec::new();

        if !root.is_dir() {
            return Ok(found);
        }

        let names = std::fs::read_dir(root)
            .with_context(|| format!("Failed to read plugin directory: {}", root.display()))?;

        let mut name_dirs: Vec<PathBuf> = names.flatten().map(|e| e.path()).filter(|p| p.is_dir()).collect();
        name_dirs.sort();

        for name_dir in name_dirs {
            let Some(name) = name_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if validate_name(name).is_err() {
                tracing::debug!(dir = %name_dir.display(), "skipping invalid plugin name");
                continue;
            }

            let versions = match std::fs::read_dir(&name_dir) {
                Ok(entries) => entries,
                Err(_) => continue, // Ignore unreadable directories
            };

            let mut version_dirs: Vec<PathBuf> =
                versions.flatten().map(|e| e.path()).filter(|p| p.is_dir()).collect();
            version_dirs.sort();

            for version_dir in version_dirs {
                let Some(version) = version_dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|v| v.parse::<Version>().ok())
                else {
                    tracing::debug!(dir = %version_dir.display(), "skipping invalid plugin version");
                    continue;
                };

                let path = version_dir.join(name);
                if is_executable(&path) {
                    found.push(DiscoveredPlugin {
                        name: name.to_string(),
                        version,
                        path,
                    });
                }
            }
        }

        Ok(found)
    }
}

impl Default for PluginDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.permissions().mode() & 0o111 != 0;
        }
        false
    }

    #[cfg(not(unix))]
    {
        true
    }
}

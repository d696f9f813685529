//! Plugin registration and lookup
//!
//! Plugins are registered once at startup. Keys (`{name}/{version}`) must be
//! unique across leaves and bundles alike.

use std::collections::HashMap;

use thiserror::Error;

use super::version::{ProjectVersion, Version};
use super::{split_key, validate_name, PluginError, PluginRef};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Two plugins are registered with the same key: {0}")]
    DuplicateKey(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Plugin name '{name}' is ambiguous for project version {project_version}, use one of: {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        project_version: ProjectVersion,
        candidates: Vec<String>,
    },

    #[error("Plugin {key} does not support project version {project_version}")]
    UnsupportedProjectVersion {
        key: String,
        project_version: ProjectVersion,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// All plugins known to the CLI
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugins in registration order
    plugins: Vec<PluginRef>,

    /// Map from key to index in `plugins`
    index: HashMap<String, usize>,

    /// Default plugin key per project version
    defaults: HashMap<ProjectVersion, String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, rejecting invalid names and duplicate keys
    pub fn register(&mut self, plugin: impl Into<PluginRef>) -> Result<(), RegistryError> {
        let plugin = plugin.into();
        validate_name(plugin.name())?;
        plugin.version().validate().map_err(PluginError::from)?;

        let key = plugin.key();
        if self.index.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key));
        }

        self.index.insert(key, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Sets the plugin used when a project of `project_version` names none
    pub fn set_default(
        &mut self,
        project_version: ProjectVersion,
        key: &str,
    ) -> Result<(), RegistryError> {
        let plugin = self
            .get(key)
            .ok_or_else(|| RegistryError::UnknownPlugin(key.to_string()))?;

        if !plugin.supports_project_version(project_version) {
            return Err(RegistryError::UnsupportedProjectVersion {
                key: key.to_string(),
                project_version,
            });
        }

        self.defaults.insert(project_version, key.to_string());
        Ok(())
    }

    /// Default plugin for `project_version`, if one was set
    pub fn defaults_for(&self, project_version: ProjectVersion) -> Option<&PluginRef> {
        self.defaults
            .get(&project_version)
            .and_then(|key| self.get(key))
    }

    /// Gets a plugin by its exact key
    pub fn get(&self, key: &str) -> Option<&PluginRef> {
        self.index.get(key).map(|&i| &self.plugins[i])
    }

    /// Lists all plugins in registration order
    pub fn list(&self) -> &[PluginRef] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Resolves a `--plugins` selector for a project version
    ///
    /// The selector is either a full key (`name/v1`) or a bare name. A bare
    /// name must match exactly one plugin supporting `project_version`.
    pub fn resolve(
        &self,
        selector: &str,
        project_version: ProjectVersion,
    ) -> Result<&PluginRef, RegistryError> {
        let selector = selector.trim();

        let plugin = match split_key(selector) {
            (name, Some(version)) => {
                let version: Version = version.parse().map_err(PluginError::from)?;
                let key = super::key_for(name, version);
                self.get(&key)
                    .ok_or_else(|| RegistryError::UnknownPlugin(selector.to_string()))?
            }
            (name, None) => {
                let named: Vec<&PluginRef> =
                    self.plugins.iter().filter(|p| p.name() == name).collect();
                if named.is_empty() {
                    return Err(RegistryError::UnknownPlugin(selector.to_string()));
                }

                let mut matching: Vec<&PluginRef> = named
                    .iter()
                    .copied()
                    .filter(|p| p.supports_project_version(project_version))
                    .collect();

                match matching.len() {
                    0 => named[0],
                    1 => matching.remove(0),
                    _ => {
                        return Err(RegistryError::Ambiguous {
                            name: name.to_string(),
                            project_version,
                            candidates: matching.iter().map(|p| p.key()).collect(),
                        });
                    }
                }
            }
        };

        if !plugin.supports_project_version(project_version) {
            return Err(RegistryError::UnsupportedProjectVersion {
                key: plugin.key(),
                project_version,
            });
        }

        Ok(plugin)
    }

    /// Resolves several selectors, keeping their order
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        selectors: &[S],
        project_version: ProjectVersion,
    ) -> Result<Vec<PluginRef>, RegistryError> {
        selectors
            .iter()
            .map(|s| self.resolve(s.as_ref(), project_version).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::stub;
    use crate::plugin::{Bundle, DynamicBundle};

    fn v(n: u32) -> ProjectVersion {
        ProjectVersion::stable(n)
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("a.dev/v1").is_none());
    }

    #[test]
    fn register_and_get() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[3])).unwrap();
        registry.register(stub("a.dev", 2, &[3])).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a.dev/v2").unwrap().version(), Version::stable(2));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[3])).unwrap();

        let err = registry.register(stub("a.dev", 1, &[2])).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKey("a.dev/v1".to_string()));
    }

    #[test]
    fn bundle_key_collides_with_leaf_key() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[3])).unwrap();

        let bundle = Bundle::new("a.dev", Version::stable(1), vec![stub("b.dev", 1, &[3])]).unwrap();
        assert!(matches!(
            registry.register(bundle),
            Err(RegistryError::DuplicateKey(_))
        ));
    }

    #[test]
    fn invalid_name_rejected() {
        let mut registry = PluginRegistry::new();
        let err = registry.register(stub("Bad_Name", 1, &[3])).unwrap_err();
        assert!(matches!(err, RegistryError::Plugin(PluginError::InvalidName(_))));
    }

    #[test]
    fn list_keeps_registration_order() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("b.dev", 1, &[3])).unwrap();
        registry.register(stub("a.dev", 1, &[3])).unwrap();

        let keys: Vec<String> = registry.list().iter().map(PluginRef::key).collect();
        assert_eq!(keys, vec!["b.dev/v1", "a.dev/v1"]);
    }

    #[test]
    fn resolve_full_key() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[2, 3])).unwrap();

        assert_eq!(registry.resolve("a.dev/v1", v(3)).unwrap().key(), "a.dev/v1");
        assert!(matches!(
            registry.resolve("a.dev/v2", v(3)),
            Err(RegistryError::UnknownPlugin(_))
        ));
    }

    #[test]
    fn resolve_bare_name_picks_supporting_version() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[2])).unwrap();
        registry.register(stub("a.dev", 2, &[3])).unwrap();

        assert_eq!(registry.resolve("a.dev", v(2)).unwrap().key(), "a.dev/v1");
        assert_eq!(registry.resolve("a.dev", v(3)).unwrap().key(), "a.dev/v2");
    }

    #[test]
    fn resolve_bare_name_ambiguous() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[3])).unwrap();
        registry.register(stub("a.dev", 2, &[3])).unwrap();

        let err = registry.resolve("a.dev", v(3)).unwrap_err();
        assert!(matches!(err, RegistryError::Ambiguous { .. }));
        assert!(err.to_string().contains("a.dev/v1, a.dev/v2"));
    }

    #[test]
    fn resolve_rejects_unsupported_project_version() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[2])).unwrap();

        assert!(matches!(
            registry.resolve("a.dev/v1", v(3)),
            Err(RegistryError::UnsupportedProjectVersion { .. })
        ));
        assert!(matches!(
            registry.resolve("a.dev", v(3)),
            Err(RegistryError::UnsupportedProjectVersion { .. })
        ));
    }

    #[test]
    fn resolve_invalid_version() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.resolve("a.dev/3", v(3)),
            Err(RegistryError::Plugin(PluginError::Version(_)))
        ));
    }

    #[test]
    fn resolve_all_keeps_order() {
        let mut registry = PluginRegistry::new();
        registry.register(stub("a.dev", 1, &[3])).unwrap();
        registry.register(stub("b.dev", 1, &[3])).unwrap();

        let resolved = registry.resolve_all(&["b.dev", "a.dev/v1"], v(3)).unwrap();
        let keys: Vec<String> = resolved.iter().map(PluginRef::key).collect();
        assert_eq!(keys, vec!["b.dev/v1", "a.dev/v1"]);
    }

    #[test]
    fn defaults_per_project_version() {
        let mut registry = PluginRegistry::new();
        let dynamic = DynamicBundle::new(
            "dyn.dev",
            Version::stable(1),
            vec![stub("a.dev", 1, &[3])],
            vec![],
            vec![],
        )
        .unwrap();
        registry.register(dynamic).unwrap();

        registry.set_default(v(3), "dyn.dev/v1").unwrap();

        assert_eq!(registry.defaults_for(v(3)).unwrap().key(), "dyn.dev/v1");
        assert!(registry.defaults_for(v(2)).is_none());
        assert!(matches!(
            registry.set_default(v(2), "dyn.dev/v1"),
            Err(RegistryError::UnsupportedProjectVersion { .. })
        ));
        assert!(matches!(
            registry.set_default(v(3), "missing.dev/v1"),
            Err(RegistryError::UnknownPlugin(_))
        ));
    }
}

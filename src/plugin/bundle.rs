//! Plugin bundles
//!
//! A bundle wraps several plugins under a single name and version. The
//! project versions a bundle supports are the ones all of its plugins
//! support, computed once when the bundle is built.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use super::version::{display_versions, ProjectVersion, Version};
use super::{key_for, leaf_key, Plugin, PluginRef};

#[derive(Debug, Error, PartialEq)]
pub enum BundleError {
    #[error("Cannot bundle plugins into '{name}': they must all support at least one common project version")]
    NoCommonProjectVersion { name: String },
}

/// Project versions supported by every plugin in `plugins`
///
/// Versions keep the order the first plugin declares them in. No plugins
/// means no versions.
pub fn common_supported_project_versions(plugins: &[PluginRef]) -> Vec<ProjectVersion> {
    let Some((first, rest)) = plugins.split_first() else {
        return Vec::new();
    };

    let mut common: Vec<ProjectVersion> = Vec::new();
    for version in first.supported_project_versions() {
        if common.contains(version) {
            continue;
        }
        if rest
            .iter()
            .all(|p| p.supported_project_versions().contains(version))
        {
            common.push(*version);
        }
    }

    common
}

/// Splices bundles into their leaves, keeping order
fn flatten(plugins: &[PluginRef]) -> Vec<Arc<dyn Plugin>> {
    plugins.iter().flat_map(PluginRef::plugins).collect()
}

fn require_common(name: &str, plugins: &[PluginRef]) -> Result<Vec<ProjectVersion>, BundleError> {
    let supported = common_supported_project_versions(plugins);
    if supported.is_empty() {
        return Err(BundleError::NoCommonProjectVersion {
            name: name.to_string(),
        });
    }
    Ok(supported)
}

fn describe_plugin(plugin: &dyn Plugin) -> String {
    format!(
        "name: {}, version: {}, project versions: {}, key: {}",
        plugin.name(),
        plugin.version(),
        display_versions(plugin.supported_project_versions()),
        leaf_key(plugin)
    )
}

/// A named, versioned, flat list of plugins
pub struct Bundle {
    name: String,
    version: Version,
    plugins: Vec<Arc<dyn Plugin>>,
    supported_project_versions: Vec<ProjectVersion>,
}

impl Bundle {
    /// Creates a bundle wrapping `plugins`
    ///
    /// Fails if the plugins share no project version. Nested bundles are
    /// flattened so [`Bundle::plugins`] only ever yields leaves.
    pub fn new(
        name: impl Into<String>,
        version: Version,
        plugins: Vec<PluginRef>,
    ) -> Result<Self, BundleError> {
        let name = name.into();
        let supported_project_versions = require_common(&name, &plugins)?;

        Ok(Self {
            name,
            version,
            plugins: flatten(&plugins),
            supported_project_versions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn key(&self) -> String {
        key_for(&self.name, self.version)
    }

    pub fn supported_project_versions(&self) -> &[ProjectVersion] {
        &self.supported_project_versions
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }
}

/// A bundle whose middle segment can be swapped at runtime
///
/// Plugins always run as `before ++ injected ++ after`. Only the injected
/// segment changes after construction.
///
/// Supported project versions are computed once from the plugins given to
/// [`DynamicBundle::new`] and are not recomputed by
/// [`DynamicBundle::inject_plugins`]. Injecting plugins that do not support
/// those versions is the caller's responsibility.
pub struct DynamicBundle {
    name: String,
    version: Version,
    supported_project_versions: Vec<ProjectVersion>,
    before: Vec<Arc<dyn Plugin>>,
    injected: Mutex<Vec<Arc<dyn Plugin>>>,
    after: Vec<Arc<dyn Plugin>>,
}

impl DynamicBundle {
    /// Creates a dynamic bundle from its three segments
    pub fn new(
        name: impl Into<String>,
        version: Version,
        before: Vec<PluginRef>,
        injected: Vec<PluginRef>,
        after: Vec<PluginRef>,
    ) -> Result<Self, BundleError> {
        let name = name.into();

        let all: Vec<PluginRef> = before
            .iter()
            .chain(injected.iter())
            .chain(after.iter())
            .cloned()
            .collect();
        let supported_project_versions = require_common(&name, &all)?;

        Ok(Self {
            name,
            version,
            supported_project_versions,
            before: flatten(&before),
            injected: Mutex::new(flatten(&injected)),
            after: flatten(&after),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn key(&self) -> String {
        key_for(&self.name, self.version)
    }

    /// Project versions computed at construction time
    pub fn supported_project_versions(&self) -> &[ProjectVersion] {
        &self.supported_project_versions
    }

    fn injected(&self) -> MutexGuard<'_, Vec<Arc<dyn Plugin>>> {
        // A panic while holding the lock cannot leave the Vec half-replaced
        self.injected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current plugins: `before ++ injected ++ after`
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        let injected = self.injected();
        self.before
            .iter()
            .chain(injected.iter())
            .chain(self.after.iter())
            .cloned()
            .collect()
    }

    /// Replaces the injected segment
    ///
    /// The new plugins are flattened but not checked against
    /// [`DynamicBundle::supported_project_versions`].
    pub fn inject_plugins(&self, plugins: Vec<PluginRef>) {
        let plugins = flatten(&plugins);

        for plugin in &plugins {
            tracing::debug!(bundle = %self.key(), "injecting plugin {}", describe_plugin(plugin.as_ref()));
        }
        tracing::info!(
            bundle = %self.key(),
            count = plugins.len(),
            "injected plugins into dynamic bundle"
        );

        *self.injected() = plugins;
    }

    /// Multi-line summary of the bundle and its current plugins
    pub fn describe(&self) -> String {
        let mut out = format!(
            "name: {}\nversion: {}\nproject versions: {}\nplugins:",
            self.name,
            self.version,
            display_versions(&self.supported_project_versions)
        );
        for plugin in self.plugins() {
            let _ = write!(out, "\n  - {}", describe_plugin(plugin.as_ref()));
        }
        out
    }
}

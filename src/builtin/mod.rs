//! # Built-in Plugins
//!
//! Plugins compiled into the CLI and the bundles built from them.
//!
//! | Key | Kind | Contents |
//! |-----|------|----------|
//! | `kustomize.common.scaffold.dev/v1` | Leaf | [`KustomizeCommonPlugin`] |
//! | `base.scaffold.dev/v1` | Bundle | kustomize |
//! | `dynamic.scaffold.dev/v1` | Dynamic bundle | kustomize, then injected plugins |
//!
//! The dynamic bundle is the default layout for project version `3`.

mod kustomize;

use crate::plugin::{
    Bundle, BundleError, DynamicBundle, PluginRef, PluginRegistry, ProjectVersion, RegistryError,
    Version,
};

pub use kustomize::{KustomizeCommonPlugin, KUSTOMIZE_CONFIG_PATH};

pub const BASE_BUNDLE: &str = "base.scaffold.dev";
pub const DYNAMIC_BUNDLE: &str = "dynamic.scaffold.dev";

#[derive(Debug, thiserror::Error)]
pub enum BuiltinError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registers every built-in plugin and the project version `3` default
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), BuiltinError> {
    let kustomize = PluginRef::leaf(KustomizeCommonPlugin);

    let base = Bundle::new(BASE_BUNDLE, Version::stable(1), vec![kustomize.clone()])?;
    let dynamic = DynamicBundle::new(
        DYNAMIC_BUNDLE,
        Version::stable(1),
        vec![kustomize.clone()],
        Vec::new(),
        Vec::new(),
    )?;
    let dynamic_key = dynamic.key();

    registry.register(kustomize)?;
    registry.register(base)?;
    registry.register(dynamic)?;
    registry.set_default(ProjectVersion::stable(3), &dynamic_key)?;

    Ok(())
}

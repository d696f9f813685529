//! Plugin management commands

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use super::output::Output;
use crate::builtin::register_builtins;
use crate::external::PluginDiscovery;
use crate::plugin::{display_versions, leaf_key, PluginRef, PluginRegistry, RegistryError};
use crate::storage::Config;

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List available plugins
    List,

    /// Show a plugin and the leaves it runs
    Show {
        /// Plugin key (name/version)
        key: String,
    },
}

pub fn run(cmd: PluginCommands, config: &Config, output: &Output) -> Result<()> {
    let registry = load_registry(config, output)?;

    match cmd {
        PluginCommands::List => list_plugins(&registry, output),
        PluginCommands::Show { key } => show_plugin(&registry, output, &key),
    }
}

/// Builds the registry from built-in plugins and discovered external plugins
pub(crate) fn load_registry(config: &Config, output: &Output) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry).context("Failed to register built-in plugins")?;

    let mut discovery = PluginDiscovery::new();
    for root in config.plugin_roots() {
        output.verbose_ctx("plugins", &format!("Searching {}", root.display()));
        discovery.add_root(root);
    }
    discovery.set_project_versions(config.external_project_versions());

    for plugin in discovery.load()? {
        let key = leaf_key(&plugin);
        let path = plugin.path().to_path_buf();
        match registry.register(PluginRef::leaf(plugin)) {
            Ok(()) => output.verbose_ctx(
                "plugins",
                &format!("Loaded external plugin {} from {}", key, path.display()),
            ),
            Err(RegistryError::DuplicateKey(dup)) => {
                tracing::warn!(key = %dup, "external plugin shadowed by a built-in plugin");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(registry)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PluginInfo {
    key: String,
    kind: &'static str,
    project_versions: Vec<String>,
    default: bool,
}

fn kind(plugin: &PluginRef) -> &'static str {
    match plugin {
        PluginRef::Leaf(_) => "leaf",
        PluginRef::Bundle(_) => "bundle",
        PluginRef::Dynamic(_) => "dynamic",
    }
}

fn list_plugins(registry: &PluginRegistry, output: &Output) -> Result<()> {
    let infos: Vec<PluginInfo> = registry
        .list()
        .iter()
        .map(|p| PluginInfo {
            key: p.key(),
            kind: kind(p),
            project_versions: p
                .supported_project_versions()
                .iter()
                .map(ToString::to_string)
                .collect(),
            default: p
                .supported_project_versions()
                .iter()
                .any(|v| registry.defaults_for(*v).map(PluginRef::key) == Some(p.key())),
        })
        .collect();

    if output.is_json() {
        output.data(&infos);
        return Ok(());
    }

    println!("{:<40} {:<8} PROJECT VERSIONS", "KEY", "KIND");
    println!("{}", "-".repeat(70));
    for info in &infos {
        let marker = if info.default { " (default)" } else { "" };
        println!(
            "{:<40} {:<8} {}{}",
            info.key,
            info.kind,
            info.project_versions.join(", "),
            marker
        );
    }

    Ok(())
}

fn show_plugin(registry: &PluginRegistry, output: &Output, key: &str) -> Result<()> {
    let plugin = registry
        .get(key)
        .ok_or_else(|| RegistryError::UnknownPlugin(key.to_string()))?;
    let leaves: Vec<String> = plugin.plugins().iter().map(|p| leaf_key(p.as_ref())).collect();

    if output.is_json() {
        output.data(&serde_json::json!({
            "key": plugin.key(),
            "kind": kind(plugin),
            "projectVersions": plugin
                .supported_project_versions()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "plugins": leaves,
        }));
        return Ok(());
    }

    match plugin {
        PluginRef::Dynamic(bundle) => println!("{}", bundle.describe()),
        _ => {
            println!("name: {}", plugin.name());
            println!("version: {}", plugin.version());
            println!(
                "project versions: {}",
                display_versions(plugin.supported_project_versions())
            );
            println!("plugins:");
            for leaf in &leaves {
                println!("  - {}", leaf);
            }
        }
    }

    Ok(())
}

//! scaffold-cli - plugin-driven project scaffolding
//!
//! Scaffolding is done by plugins. Leaf plugins generate files for a CLI
//! phase, bundles compose them into ordered layouts, and external plugins
//! run as separate executables speaking a JSON protocol over stdin/stdout.

pub mod builtin;
pub mod cli;
pub mod external;
pub mod machinery;
pub mod plugin;
pub mod storage;

pub use plugin::{Phase, Plugin, PluginRef, PluginRegistry, ProjectVersion, Version};

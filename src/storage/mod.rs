//! # Storage Layer
//!
//! Files the CLI reads and writes outside of what plugins generate.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Project descriptor | YAML | `PROJECT` at the project root |
//! | Global config | TOML | `~/.config/scaffold-cli/config.toml` |
//! | External plugins | Executables | `~/.config/scaffold-cli/plugins/{name}/{version}/{name}` |
//!
//! ## Key Types
//!
//! - [`Project`] - A directory holding a `PROJECT` descriptor
//! - [`Config`] - Global configuration and plugin roots

mod config;
mod project;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, PLUGINS_DIR_ENV};
pub use project::{Project, ProjectDescriptor, ProjectError, PROJECT_FILE};

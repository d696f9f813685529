//! External plugin protocol types
//!
//! The CLI writes one [`PluginRequest`] as JSON to the plugin's stdin and
//! reads one [`PluginResponse`] as JSON from its stdout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Protocol version spoken by this CLI
pub const API_VERSION: &str = "v1alpha1";

/// Relative file path to file content
pub type Universe = BTreeMap<String, String>;

/// A request sent to an external plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRequest {
    /// Protocol version, always [`API_VERSION`]
    pub api_version: String,

    /// Subcommand, e.g. "init" or "create webhook"
    pub command: String,

    /// Raw CLI tokens, passed through verbatim
    pub args: Vec<String>,

    /// Project files shared with the plugin as context
    pub universe: Universe,
}

impl PluginRequest {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            command: command.into(),
            args,
            universe: Universe::new(),
        }
    }

    pub fn with_universe(mut self, universe: Universe) -> Self {
        self.universe = universe;
        self
    }
}

/// A response from an external plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResponse {
    /// Protocol version the plugin answered with (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Echo of the request command (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Whether the plugin rejected the request
    #[serde(default)]
    pub error: bool,

    /// Messages explaining the rejection
    #[serde(default)]
    pub error_msgs: Vec<String>,

    /// Files to write, relative to the working directory
    #[serde(default)]
    pub universe: Universe,
}

impl PluginResponse {
    /// Rejects a response that names a protocol version other than [`API_VERSION`]
    ///
    /// A missing `apiVersion` is accepted.
    pub fn check_api_version(&self) -> Result<(), String> {
        match self.api_version.as_deref() {
            Some(version) if version != API_VERSION => Err(format!(
                "unsupported apiVersion '{}', expected '{}'",
                version, API_VERSION
            )),
            _ => Ok(()),
        }
    }

    /// Error messages joined by newlines
    pub fn error_message(&self) -> String {
        self.error_msgs.join("\n")
    }
}

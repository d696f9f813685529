//! Project management
//!
//! A project is a directory holding a `PROJECT` descriptor that records the
//! project version and the plugin layout used to scaffold it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin::ProjectVersion;

/// Name of the project descriptor file
pub const PROJECT_FILE: &str = "PROJECT";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Not in a scaffolded project. Run 'scaffold init' first.")]
    NotInProject,

    #[error("Failed to parse {}: {reason}", .path.display())]
    InvalidDescriptor { path: PathBuf, reason: String },
}

/// Contents of the `PROJECT` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    /// Project version (schema of this file)
    pub version: ProjectVersion,

    /// Plugin keys used to scaffold the project, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout: Vec<String>,

    /// Plugin keys injected into the first dynamic bundle of the layout
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injected: Vec<String>,

    /// Human-readable project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl ProjectDescriptor {
    pub fn new(version: ProjectVersion, layout: Vec<String>) -> Self {
        Self {
            version,
            layout,
            injected: Vec::new(),
            project_name: None,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize project descriptor")
    }
}

/// A scaffolded project
pub struct Project {
    root: PathBuf,
    descriptor: ProjectDescriptor,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(PROJECT_FILE);

        if !path.is_file() {
            return Err(ProjectError::NotInProject.into());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project descriptor: {}", path.display()))?;

        let descriptor: ProjectDescriptor =
            serde_yaml::from_str(&content).map_err(|e| ProjectError::InvalidDescriptor {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { root, descriptor })
    }

    /// Finds the project root by looking for a `PROJECT` file
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_FILE).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>, descriptor: ProjectDescriptor) -> Result<Self> {
        let root = root.into();
        let path = root.join(PROJECT_FILE);

        if path.exists() {
            return Err(ProjectError::AlreadyExists(root).into());
        }

        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create project directory: {}", root.display()))?;

        fs::write(&path, descriptor.to_yaml()?)
            .with_context(|| format!("Failed to write project descriptor: {}", path.display()))?;

        Ok(Self { root, descriptor })
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `PROJECT` file path
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(PROJECT_FILE)
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn version(&self) -> ProjectVersion {
        self.descriptor.version
    }

    pub fn layout(&self) -> &[String] {
        &self.descriptor.layout
    }

    pub fn injected(&self) -> &[String] {
        &self.descriptor.injected
    }
}

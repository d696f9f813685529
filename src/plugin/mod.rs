//! # Plugin System
//!
//! Identity, versioning and composition of scaffolding plugins.
//!
//! ## Overview
//!
//! A plugin is a named, versioned unit of generation capability that declares
//! which project versions (the schema of the `PROJECT` descriptor) it can work
//! with. Plugins are addressed by their key, `{name}/{version}`:
//!
//! ```text
//! kustomize.common.scaffold.dev/v1
//! go.example.dev/v2-alpha
//! ```
//!
//! ## Plugin Variants
//!
//! | Variant | Type | Purpose |
//! |---------|------|---------|
//! | Leaf | [`Plugin`] | Scaffolds files for one or more phases |
//! | Bundle | [`Bundle`] | Ordered, flattened list of leaves |
//! | Dynamic bundle | [`DynamicBundle`] | Bundle whose middle segment can be replaced |
//!
//! All three are carried around as a [`PluginRef`]. Bundles only ever hold
//! leaves: nested bundles are spliced in when the outer bundle is built.
//!
//! ## Phases
//!
//! Each CLI subcommand is a [`Phase`]. For a phase, every leaf of the
//! resolved layout runs in order, strictly one after the other.
//!
//! ## Key Types
//!
//! - [`Plugin`] - Leaf capability implemented by generators
//! - [`PluginRef`] - Any plugin variant
//! - [`Version`] / [`ProjectVersion`] - Plugin and project schema versions
//! - [`PluginRegistry`] - Registration and lookup by key

mod bundle;
mod registry;
mod version;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::machinery::{Filesystem, IfExistsAction, MachineryError, WorkingDir, WriteOutcome};

pub use bundle::{common_supported_project_versions, Bundle, BundleError, DynamicBundle};
pub use registry::{PluginRegistry, RegistryError};
pub use version::{display_versions, ProjectVersion, Stage, Version, VersionError};

#[derive(Debug, Error, PartialEq)]
pub enum PluginError {
    #[error("Invalid plugin name '{0}': must be lowercase alphanumerics, '-' or '.'")]
    InvalidName(String),

    #[error("Invalid plugin key '{0}': expected '{{name}}/{{version}}'")]
    InvalidKey(String),

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A CLI subcommand that plugins take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    CreateApi,
    CreateWebhook,
    Edit,
}

impl Phase {
    /// Literal subcommand name, as sent to external plugins
    pub fn command(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::CreateApi => "create api",
            Phase::CreateWebhook => "create webhook",
            Phase::Edit => "edit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// State shared with a plugin while it scaffolds one phase
pub struct ScaffoldContext<'a> {
    fs: &'a dyn Filesystem,
    working_dir: &'a dyn WorkingDir,
    project_root: Option<PathBuf>,
    args: &'a [String],
    project_version: ProjectVersion,
    written: Vec<WriteOutcome>,
}

impl<'a> ScaffoldContext<'a> {
    pub fn new(
        fs: &'a dyn Filesystem,
        working_dir: &'a dyn WorkingDir,
        args: &'a [String],
        project_version: ProjectVersion,
    ) -> Self {
        Self {
            fs,
            working_dir,
            project_root: None,
            args,
            project_version,
            written: Vec::new(),
        }
    }

    /// Anchors [`write`](Self::write) and `PROJECT` lookups at `root`
    /// instead of the working directory
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn fs(&self) -> &'a dyn Filesystem {
        self.fs
    }

    /// Raw argument tokens passed to the subcommand
    pub fn args(&self) -> &'a [String] {
        self.args
    }

    pub fn project_version(&self) -> ProjectVersion {
        self.project_version
    }

    /// Directory holding `PROJECT`; the working directory unless set
    pub fn project_root(&self) -> io::Result<PathBuf> {
        match &self.project_root {
            Some(root) => Ok(root.clone()),
            None => self.working_dir.current_dir(),
        }
    }

    /// Writes a file relative to the project root and records it
    pub fn write(
        &mut self,
        relative: impl AsRef<Path>,
        content: &str,
        if_exists: IfExistsAction,
    ) -> Result<WriteOutcome, MachineryError> {
        let base = self.project_root();
        self.write_under(base, relative.as_ref(), content, if_exists)
    }

    /// Writes a file relative to the invoking process's working directory
    /// and records it
    pub fn write_to_working_dir(
        &mut self,
        relative: impl AsRef<Path>,
        content: &str,
        if_exists: IfExistsAction,
    ) -> Result<WriteOutcome, MachineryError> {
        let base = self.working_dir.current_dir();
        self.write_under(base, relative.as_ref(), content, if_exists)
    }

    fn write_under(
        &mut self,
        base: io::Result<PathBuf>,
        relative: &Path,
        content: &str,
        if_exists: IfExistsAction,
    ) -> Result<WriteOutcome, MachineryError> {
        let base = base.map_err(|source| MachineryError::Io {
            path: relative.to_path_buf(),
            source,
        })?;

        let outcome = self.fs.write(&base.join(relative), content, if_exists)?;
        self.written.push(outcome.clone());
        Ok(outcome)
    }

    /// Files touched so far, in write order
    pub fn written(&self) -> &[WriteOutcome] {
        &self.written
    }

    pub fn into_written(self) -> Vec<WriteOutcome> {
        self.written
    }
}

/// Leaf plugin capability
///
/// Implementors scaffold files for the phases they support. Composition
/// into bundles happens through [`PluginRef`], never by implementing this
/// trait on a composite.
pub trait Plugin: Send + Sync {
    /// Plugin name, e.g. `kustomize.common.scaffold.dev`
    fn name(&self) -> &str;

    fn version(&self) -> Version;

    /// Project versions this plugin can scaffold, in preference order
    fn supported_project_versions(&self) -> &[ProjectVersion];

    /// Whether the plugin takes part in `phase`
    fn supports(&self, _phase: Phase) -> bool {
        true
    }

    /// Scaffolds files for `phase`
    fn scaffold(&self, phase: Phase, ctx: &mut ScaffoldContext<'_>) -> anyhow::Result<()>;
}

/// Any plugin variant: a leaf, a bundle or a dynamic bundle
#[derive(Clone)]
pub enum PluginRef {
    Leaf(Arc<dyn Plugin>),
    Bundle(Arc<Bundle>),
    Dynamic(Arc<DynamicBundle>),
}

impl PluginRef {
    pub fn leaf(plugin: impl Plugin + 'static) -> Self {
        PluginRef::Leaf(Arc::new(plugin))
    }

    pub fn name(&self) -> &str {
        match self {
            PluginRef::Leaf(p) => p.name(),
            PluginRef::Bundle(b) => b.name(),
            PluginRef::Dynamic(d) => d.name(),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            PluginRef::Leaf(p) => p.version(),
            PluginRef::Bundle(b) => b.version(),
            PluginRef::Dynamic(d) => d.version(),
        }
    }

    pub fn supported_project_versions(&self) -> &[ProjectVersion] {
        match self {
            PluginRef::Leaf(p) => p.supported_project_versions(),
            PluginRef::Bundle(b) => b.supported_project_versions(),
            PluginRef::Dynamic(d) => d.supported_project_versions(),
        }
    }

    pub fn supports_project_version(&self, version: ProjectVersion) -> bool {
        self.supported_project_versions().contains(&version)
    }

    pub fn key(&self) -> String {
        key_for(self.name(), self.version())
    }

    /// Flat list of leaves, in execution order
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        match self {
            PluginRef::Leaf(p) => vec![Arc::clone(p)],
            PluginRef::Bundle(b) => b.plugins().to_vec(),
            PluginRef::Dynamic(d) => d.plugins(),
        }
    }
}

impl fmt::Debug for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            PluginRef::Leaf(_) => "Leaf",
            PluginRef::Bundle(_) => "Bundle",
            PluginRef::Dynamic(_) => "Dynamic",
        };
        f.debug_tuple(kind).field(&self.key()).finish()
    }
}

impl From<Bundle> for PluginRef {
    fn from(bundle: Bundle) -> Self {
        PluginRef::Bundle(Arc::new(bundle))
    }
}

impl From<DynamicBundle> for PluginRef {
    fn from(bundle: DynamicBundle) -> Self {
        PluginRef::Dynamic(Arc::new(bundle))
    }
}

impl From<Arc<dyn Plugin>> for PluginRef {
    fn from(plugin: Arc<dyn Plugin>) -> Self {
        PluginRef::Leaf(plugin)
    }
}

/// Builds the lookup key for a plugin, `{name}/{version}`
pub fn key_for(name: &str, version: Version) -> String {
    format!("{}/{}", name, version)
}

/// Key of a leaf plugin
pub fn leaf_key(plugin: &dyn Plugin) -> String {
    key_for(plugin.name(), plugin.version())
}

/// Splits a key into name and optional version string
///
/// `a.dev/v1` yields `("a.dev", Some("v1"))`, a bare `a.dev` yields
/// `("a.dev", None)`.
pub fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.rsplit_once('/') {
        Some((name, version)) => (name, Some(version)),
        None => (key, None),
    }
}

/// Parses a full `{name}/{version}` key
pub fn parse_key(key: &str) -> Result<(String, Version), PluginError> {
    match split_key(key.trim()) {
        (name, Some(version)) if !name.is_empty() => {
            validate_name(name)?;
            Ok((name.to_string(), version.parse()?))
        }
        _ => Err(PluginError::InvalidKey(key.to_string())),
    }
}

/// Checks a plugin name is a lowercase DNS-style name
pub fn validate_name(name: &str) -> Result<(), PluginError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let edges_ok = name
        .chars()
        .next()
        .zip(name.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if valid_chars && edges_ok && !name.contains("..") {
        Ok(())
    } else {
        Err(PluginError::InvalidName(name.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::stub;
    use super::*;

    #[test]
    fn phase_commands() {
        assert_eq!(Phase::Init.command(), "init");
        assert_eq!(Phase::CreateApi.command(), "create api");
        assert_eq!(Phase::CreateWebhook.command(), "create webhook");
        assert_eq!(Phase::Edit.command(), "edit");
    }

    #[test]
    fn key_format() {
        assert_eq!(key_for("a.dev", Version::stable(3)), "a.dev/v3");
        assert_eq!(
            key_for("a.dev", Version::new(2, Stage::Alpha)),
            "a.dev/v2-alpha"
        );
    }

    #[test]
    fn split_keys() {
        assert_eq!(split_key("a.dev/v1"), ("a.dev", Some("v1")));
        assert_eq!(split_key("a.dev"), ("a.dev", None));
    }

    #[test]
    fn parse_full_key() {
        let (name, version) = parse_key("go.example.dev/v2-beta").unwrap();
        assert_eq!(name, "go.example.dev");
        assert_eq!(version, Version::new(2, Stage::Beta));

        assert!(matches!(parse_key("go"), Err(PluginError::InvalidKey(_))));
        assert!(matches!(parse_key("/v1"), Err(PluginError::InvalidKey(_))));
        assert!(matches!(parse_key("go/3"), Err(PluginError::Version(_))));
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("kustomize.common.scaffold.dev").is_ok());
        assert!(validate_name("go-v3").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Upper").is_err());
        assert!(validate_name(".leading").is_err());
        assert!(validate_name("trailing-").is_err());
        assert!(validate_name("double..dot").is_err());
        assert!(validate_name("with/slash").is_err());
    }

    #[test]
    fn leaf_ref_exposes_itself() {
        let leaf = stub("a.dev", 1, &[3]);

        assert_eq!(leaf.key(), "a.dev/v1");
        assert!(matches!(leaf, PluginRef::Leaf(_)));
        assert_eq!(leaf.plugins().len(), 1);
        assert!(leaf.supports_project_version(ProjectVersion::stable(3)));
        assert!(!leaf.supports_project_version(ProjectVersion::stable(2)));
        assert_eq!(format!("{:?}", leaf), "Leaf(\"a.dev/v1\")");
    }

    #[test]
    fn context_writes_relative_to_working_dir() {
        use crate::machinery::{OsFilesystem, WriteStatus};

        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let args = vec!["--domain".to_string(), "example.com".to_string()];
        let mut ctx =
            ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));

        let outcome = ctx
            .write("config/a.yaml", "a: 1\n", IfExistsAction::Overwrite)
            .unwrap();

        assert_eq!(outcome.status, WriteStatus::Created);
        assert_eq!(outcome.path, root.join("config/a.yaml"));
        assert_eq!(ctx.args(), args.as_slice());
        assert_eq!(ctx.written().len(), 1);
        assert_eq!(ctx.into_written()[0].path, root.join("config/a.yaml"));
    }

    #[test]
    fn project_root_and_working_dir_are_separate_bases() {
        use crate::machinery::OsFilesystem;

        let project = tempfile::TempDir::new().unwrap();
        let cwd = tempfile::TempDir::new().unwrap();
        let working_dir = cwd.path().to_path_buf();
        let args = Vec::new();
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &working_dir, &args, ProjectVersion::stable(3))
            .with_project_root(project.path());

        assert_eq!(ctx.project_root().unwrap(), project.path());

        ctx.write("root.txt", "r", IfExistsAction::Overwrite).unwrap();
        ctx.write_to_working_dir("here.txt", "h", IfExistsAction::Overwrite)
            .unwrap();

        assert!(project.path().join("root.txt").exists());
        assert!(!cwd.path().join("root.txt").exists());
        assert!(cwd.path().join("here.txt").exists());
        assert!(!project.path().join("here.txt").exists());
        assert_eq!(ctx.written().len(), 2);
    }
}

//! # External Plugins
//!
//! Plugins that live in a separate executable and talk to the CLI through
//! JSON over stdin/stdout. Any language can implement one.
//!
//! ## Protocol
//!
//! ```text
//! CLI                                   Plugin Binary
//!  │                                        │
//!  ├── Spawn (no arguments)                 │
//!  │                                        │
//!  ├── Stdin:  {"apiVersion": "v1alpha1", "command": "init",
//!  │            "args": [...], "universe": {...}}
//!  │                                        │
//!  ├── Stderr: passed through to the terminal
//!  │                                        │
//!  └── Stdout: {"error": false, "errorMsgs": [], "universe": {"path": "content"}}
//! ```
//!
//! A non-zero exit status aborts the subcommand before stdout is parsed.
//! When the response has `"error": true`, its `errorMsgs` are reported to the
//! user and nothing is written. Otherwise every `universe` entry is written
//! relative to the working directory of the CLI process, which may be a
//! subdirectory of the project.
//!
//! ## Stages
//!
//! | Stage | Failure |
//! |-------|---------|
//! | Build request | [`ExternalError::ReadContext`], [`ExternalError::Serialize`] |
//! | Invoke | [`ExternalError::Execution`] |
//! | Parse | [`ExternalError::Protocol`] |
//! | Check | [`ExternalError::PluginReported`] |
//! | Materialize | [`ExternalError::UnsafePath`], [`ExternalError::Io`] |
//!
//! Files written before a materialization failure are kept.
//!
//! ## Discovery
//!
//! External plugins are found under plugin roots laid out as
//! `{root}/{name}/{version}/{name}`, see [`PluginDiscovery`].

mod discovery;
mod exec;
mod protocol;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::machinery::{IfExistsAction, MachineryError};
use crate::plugin::{Phase, Plugin, ProjectVersion, ScaffoldContext, Version};
use crate::storage::PROJECT_FILE;

pub use discovery::{DiscoveredPlugin, PluginDiscovery, DEFAULT_PROJECT_VERSIONS};
pub use exec::{OutputGetter, ProcessOutputGetter};
pub use protocol::{PluginRequest, PluginResponse, Universe, API_VERSION};

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("External plugin {} failed: {reason}", .path.display())]
    Execution { path: PathBuf, reason: String },

    #[error("External plugin {} returned an invalid response: {reason}", .path.display())]
    Protocol { path: PathBuf, reason: String },

    #[error("{0}")]
    PluginReported(String),

    #[error("Failed to materialize {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: MachineryError,
    },

    #[error("External plugin returned unsafe path '{0}': paths must stay inside the working directory")]
    UnsafePath(String),

    #[error("Failed to read {} for the plugin request", .path.display())]
    ReadContext {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize plugin request")]
    Serialize(#[source] serde_json::Error),
}

/// A plugin implemented by an external executable
pub struct ExternalPlugin {
    name: String,
    version: Version,
    path: PathBuf,
    supported_project_versions: Vec<ProjectVersion>,
    output_getter: Arc<dyn OutputGetter>,
}

impl ExternalPlugin {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        path: impl Into<PathBuf>,
        supported_project_versions: Vec<ProjectVersion>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            path: path.into(),
            supported_project_versions,
            output_getter: Arc::new(ProcessOutputGetter),
        }
    }

    /// Replaces how the executable is run
    pub fn with_output_getter(mut self, getter: impl OutputGetter + 'static) -> Self {
        self.output_getter = Arc::new(getter);
        self
    }

    /// Path to the plugin executable
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds the request for `phase`
    ///
    /// `create api` and `create webhook` share the project descriptor with
    /// the plugin when one exists at the project root.
    pub fn build_request(
        &self,
        phase: Phase,
        ctx: &ScaffoldContext<'_>,
    ) -> Result<PluginRequest, ExternalError> {
        let mut universe = Universe::new();

        if matches!(phase, Phase::CreateApi | Phase::CreateWebhook) {
            let read_err = |source: io::Error| ExternalError::ReadContext {
                path: PathBuf::from(PROJECT_FILE),
                source,
            };
            let root = ctx.project_root().map_err(read_err)?;
            if let Some(descriptor) = ctx
                .fs()
                .read_to_string(&root.join(PROJECT_FILE))
                .map_err(read_err)?
            {
                universe.insert(PROJECT_FILE.to_string(), descriptor);
            }
        }

        Ok(PluginRequest::new(phase.command(), ctx.args().to_vec()).with_universe(universe))
    }

    /// Sends `request` to the plugin and returns its checked response
    pub fn call(&self, request: &PluginRequest) -> Result<PluginResponse, ExternalError> {
        let payload = serde_json::to_vec(request).map_err(ExternalError::Serialize)?;

        tracing::debug!(
            plugin = %self.path.display(),
            command = %request.command,
            "invoking external plugin"
        );
        let out = self.output_getter.exec_output(&payload, &self.path)?;

        let protocol = |reason: String| ExternalError::Protocol {
            path: self.path.clone(),
            reason,
        };

        let response: PluginResponse =
            serde_json::from_slice(&out).map_err(|e| protocol(e.to_string()))?;

        response.check_api_version().map_err(protocol)?;

        if response.error {
            return Err(ExternalError::PluginReported(response.error_message()));
        }

        Ok(response)
    }

    /// Runs the full request/response exchange for `phase`
    pub fn run(&self, phase: Phase, ctx: &mut ScaffoldContext<'_>) -> Result<(), ExternalError> {
        let request = self.build_request(phase, ctx)?;
        let response = self.call(&request)?;
        materialize(ctx, &response.universe)
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Version {
        self.version
    }

    fn supported_project_versions(&self) -> &[ProjectVersion] {
        &self.supported_project_versions
    }

    fn scaffold(&self, phase: Phase, ctx: &mut ScaffoldContext<'_>) -> anyhow::Result<()> {
        self.run(phase, ctx)?;
        Ok(())
    }
}

/// Checks a universe path stays below the working directory
fn check_relative(path: &str) -> Result<(), ExternalError> {
    let unsafe_path = || ExternalError::UnsafePath(path.to_string());

    if path.is_empty() {
        return Err(unsafe_path());
    }

    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }

    Ok(())
}

/// Writes every universe entry relative to the process working directory
///
/// All paths are checked before the first write. The first failing write
/// stops the loop; files written before it are kept.
pub fn materialize(ctx: &mut ScaffoldContext<'_>, universe: &Universe) -> Result<(), ExternalError> {
    for path in universe.keys() {
        check_relative(path)?;
    }

    for (path, content) in universe {
        ctx.write_to_working_dir(path, content, IfExistsAction::default())
            .map_err(|source| ExternalError::Io {
                path: PathBuf::from(path),
                source,
            })?;
        tracing::debug!(file = %path, "materialized file");
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinery::{OsFilesystem, WriteStatus};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns a fixed stdout and remembers the request it was given
    struct FixedOutput {
        stdout: Vec<u8>,
        seen: Arc<Mutex<Vec<u8>>>,
    }

    impl OutputGetter for FixedOutput {
        fn exec_output(&self, request: &[u8], _path: &Path) -> Result<Vec<u8>, ExternalError> {
            *self.seen.lock().unwrap() = request.to_vec();
            Ok(self.stdout.clone())
        }
    }

    struct FailingOutput;

    impl OutputGetter for FailingOutput {
        fn exec_output(&self, _request: &[u8], path: &Path) -> Result<Vec<u8>, ExternalError> {
            Err(ExternalError::Execution {
                path: path.to_path_buf(),
                reason: "exited with status 1".to_string(),
            })
        }
    }

    fn plugin_returning(stdout: &str) -> (ExternalPlugin, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let plugin = ExternalPlugin::new(
            "ext.dev",
            Version::stable(1),
            "/plugins/ext.dev/v1/ext.dev",
            vec![ProjectVersion::stable(3)],
        )
        .with_output_getter(FixedOutput {
            stdout: stdout.as_bytes().to_vec(),
            seen: Arc::clone(&seen),
        });
        (plugin, seen)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current).unwrap().flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let rel = path.strip_prefix(dir).unwrap();
                    files.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        files
    }

    #[test]
    fn materializes_universe() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let (plugin, _) = plugin_returning(
            r#"{"error":false,"errorMsgs":[],"universe":{"main.go":"package main\n","config/a.yaml":"a: 1\n"}}"#,
        );

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        plugin.run(Phase::Init, &mut ctx).unwrap();

        assert_eq!(files_in(dir.path()), vec!["config/a.yaml", "main.go"]);
        assert_eq!(fs::read_to_string(dir.path().join("main.go")).unwrap(), "package main\n");
        assert_eq!(ctx.written().len(), 2);
        assert!(ctx.written().iter().all(|w| w.status == WriteStatus::Created));
    }

    #[test]
    fn request_has_command_and_args() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let (plugin, seen) = plugin_returning(r#"{"universe":{}}"#);

        let args = vec!["--domain".to_string(), "example.com".to_string()];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        plugin.run(Phase::Init, &mut ctx).unwrap();

        let request: PluginRequest = serde_json::from_slice(&seen.lock().unwrap()).unwrap();
        assert_eq!(request.api_version, API_VERSION);
        assert_eq!(request.command, "init");
        assert_eq!(request.args, args);
        assert!(request.universe.is_empty());
    }

    #[test]
    fn create_webhook_shares_project_descriptor() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(dir.path().join(PROJECT_FILE), "version: \"3\"\n").unwrap();
        let (plugin, seen) = plugin_returning(r#"{"universe":{}}"#);

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        plugin.run(Phase::CreateWebhook, &mut ctx).unwrap();

        let request: PluginRequest = serde_json::from_slice(&seen.lock().unwrap()).unwrap();
        assert_eq!(request.command, "create webhook");
        assert_eq!(
            request.universe.get(PROJECT_FILE).map(String::as_str),
            Some("version: \"3\"\n")
        );
    }

    #[test]
    fn universe_lands_in_working_dir_not_project_root() {
        let project = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        fs::write(project.path().join(PROJECT_FILE), "version: \"3\"\n").unwrap();
        let working_dir = cwd.path().to_path_buf();
        let (plugin, seen) = plugin_returning(r#"{"universe":{"out.txt":"x"}}"#);

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &working_dir, &args, ProjectVersion::stable(3))
            .with_project_root(project.path());
        plugin.run(Phase::CreateApi, &mut ctx).unwrap();

        let request: PluginRequest = serde_json::from_slice(&seen.lock().unwrap()).unwrap();
        assert_eq!(
            request.universe.get(PROJECT_FILE).map(String::as_str),
            Some("version: \"3\"\n")
        );
        assert_eq!(fs::read_to_string(cwd.path().join("out.txt")).unwrap(), "x");
        assert!(!project.path().join("out.txt").exists());
    }

    #[test]
    fn init_does_not_share_project_descriptor() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(dir.path().join(PROJECT_FILE), "version: \"3\"\n").unwrap();
        let (plugin, _) = plugin_returning(r#"{"universe":{}}"#);

        let args: Vec<String> = vec![];
        let ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let request = plugin.build_request(Phase::Init, &ctx).unwrap();

        assert!(request.universe.is_empty());
    }

    #[test]
    fn plugin_reported_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let (plugin, _) = plugin_returning(
            r#"{"error":true,"errorMsgs":["bad arg","try --help"],"universe":{"x.txt":"x"}}"#,
        );

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::Init, &mut ctx).unwrap_err();

        match err {
            ExternalError::PluginReported(message) => assert_eq!(message, "bad arg\ntry --help"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn malformed_response_is_protocol_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let (plugin, _) = plugin_returning("not json");

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::Edit, &mut ctx).unwrap_err();

        assert!(matches!(err, ExternalError::Protocol { .. }));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn wrong_api_version_is_protocol_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let (plugin, _) = plugin_returning(r#"{"apiVersion":"v9","universe":{"x.txt":"x"}}"#);

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::Init, &mut ctx).unwrap_err();

        assert!(err.to_string().contains("unsupported apiVersion 'v9'"));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn execution_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let plugin = ExternalPlugin::new(
            "ext.dev",
            Version::stable(1),
            "/missing",
            vec![ProjectVersion::stable(3)],
        )
        .with_output_getter(FailingOutput);

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::CreateApi, &mut ctx).unwrap_err();

        assert!(matches!(err, ExternalError::Execution { .. }));
        assert!(ctx.written().is_empty());
    }

    #[test]
    fn unsafe_paths_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        let (plugin, _) = plugin_returning(
            r#"{"universe":{"a.txt":"a","../escape.txt":"x"}}"#,
        );

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::Init, &mut ctx).unwrap_err();

        assert!(matches!(err, ExternalError::UnsafePath(ref p) if p == "../escape.txt"));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn path_checks() {
        assert!(check_relative("a/b.txt").is_ok());
        assert!(check_relative("./a.txt").is_ok());
        assert!(check_relative("").is_err());
        assert!(check_relative("/etc/passwd").is_err());
        assert!(check_relative("a/../../b").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_keeps_earlier_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        // "b" exists as a file, so "b/c.txt" cannot be created
        fs::write(dir.path().join("b"), "blocker").unwrap();
        let (plugin, _) = plugin_returning(r#"{"universe":{"a.txt":"a","b/c.txt":"c","d.txt":"d"}}"#);

        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        let err = plugin.run(Phase::Init, &mut ctx).unwrap_err();

        match err {
            ExternalError::Io { path, .. } => assert_eq!(path, PathBuf::from("b/c.txt")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(dir.path().join("a.txt").is_file());
        assert!(!dir.path().join("d.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn round_trip_through_real_process() {
        use super::testing::write_script;

        let dir = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let script = write_script(
            bin.path(),
            "ext.dev",
            r#"cat > /dev/null
echo "plugin says hi" >&2
printf '%s' '{"apiVersion":"v1alpha1","error":false,"errorMsgs":[],"universe":{"hello.txt":"hello\nworld\n"}}'
"#,
        );
        let plugin = ExternalPlugin::new("ext.dev", Version::stable(1), script, vec![ProjectVersion::stable(3)]);

        let root = dir.path().to_path_buf();
        let args: Vec<String> = vec![];
        let mut ctx = ScaffoldContext::new(&OsFilesystem, &root, &args, ProjectVersion::stable(3));
        plugin.scaffold(Phase::Init, &mut ctx).unwrap();

        assert_eq!(files_in(dir.path()), vec!["hello.txt"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
            "hello\nworld\n"
        );
    }
}

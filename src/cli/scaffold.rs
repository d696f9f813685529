//! Scaffolding commands: `init`, `create api`, `create webhook` and `edit`

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::output::Output;
use super::plugin_cmd::load_registry;
use crate::machinery::{OsFilesystem, OsWorkingDir, WriteOutcome, WriteStatus};
use crate::plugin::{leaf_key, Phase, PluginRef, PluginRegistry, ProjectVersion, ScaffoldContext};
use crate::storage::{Config, Project, ProjectDescriptor, ProjectError, PROJECT_FILE};

/// Arguments of `scaffold init`
pub struct InitOptions {
    pub plugins: Vec<String>,
    pub inject: Vec<String>,
    pub project_version: ProjectVersion,
    pub project_name: Option<String>,
    pub args: Vec<String>,
}

/// Creates the `PROJECT` descriptor and runs the layout's `init` phase
pub fn init(config: &Config, output: &Output, opts: InitOptions) -> Result<()> {
    let root = std::env::current_dir().context("Failed to get current directory")?;
    if root.join(PROJECT_FILE).exists() {
        return Err(ProjectError::AlreadyExists(root).into());
    }

    let version = opts.project_version;
    let registry = load_registry(config, output)?;
    let layout = resolve_layout(&registry, &opts.plugins, version)?;
    let injected = inject(&registry, &layout, &opts.inject, version)?;

    let mut descriptor = ProjectDescriptor::new(version, layout.iter().map(PluginRef::key).collect());
    descriptor.injected = injected;
    descriptor.project_name = opts.project_name;

    let project = Project::init(&root, descriptor)?;
    output.verbose_ctx(
        "init",
        &format!("Wrote {}", project.descriptor_path().display()),
    );

    let written = run_phase(&layout, Phase::Init, project.root(), &opts.args, version, output)?;
    report(output, Phase::Init, project.root(), &layout, &written);

    Ok(())
}

/// Runs `phase` for the project containing the working directory
pub fn run_in_project(config: &Config, output: &Output, phase: Phase, args: Vec<String>) -> Result<()> {
    let root = config.require_project_root()?;
    let project = Project::open(root)?;
    let version = project.version();
    output.verbose_ctx(
        phase.command(),
        &format!("Project at {} (version {})", project.root().display(), version),
    );

    let registry = load_registry(config, output)?;
    let layout = resolve_layout(&registry, project.layout(), version)?;
    inject(&registry, &layout, project.injected(), version)?;

    let written = run_phase(&layout, phase, project.root(), &args, version, output)?;
    report(output, phase, project.root(), &layout, &written);

    Ok(())
}

/// Resolves plugin selectors, falling back to the project version's default
fn resolve_layout(
    registry: &PluginRegistry,
    selectors: &[String],
    version: ProjectVersion,
) -> Result<Vec<PluginRef>> {
    if selectors.is_empty() {
        let default = registry.defaults_for(version).ok_or_else(|| {
            anyhow::anyhow!(
                "No default plugins for project version {}. Pass --plugins to choose some.",
                version
            )
        })?;
        return Ok(vec![default.clone()]);
    }

    Ok(registry.resolve_all(selectors, version)?)
}

/// Injects the selected plugins into the first dynamic bundle of the layout
///
/// Returns the keys of the injected plugins.
fn inject(
    registry: &PluginRegistry,
    layout: &[PluginRef],
    selectors: &[String],
    version: ProjectVersion,
) -> Result<Vec<String>> {
    if selectors.is_empty() {
        return Ok(Vec::new());
    }

    let bundle = layout
        .iter()
        .find_map(|p| match p {
            PluginRef::Dynamic(bundle) => Some(bundle),
            _ => None,
        })
        .ok_or_else(|| anyhow::anyhow!("Cannot inject plugins: the layout has no dynamic bundle"))?;

    let plugins = registry.resolve_all(selectors, version)?;
    let keys = plugins.iter().map(PluginRef::key).collect();
    bundle.inject_plugins(plugins);

    Ok(keys)
}

/// Runs every leaf of the layout for `phase`, one after the other
fn run_phase(
    layout: &[PluginRef],
    phase: Phase,
    root: &Path,
    args: &[String],
    version: ProjectVersion,
    output: &Output,
) -> Result<Vec<WriteOutcome>> {
    // Built-ins write under the project root; external universes land in
    // the directory the command was run from.
    let mut ctx = ScaffoldContext::new(&OsFilesystem, &OsWorkingDir, args, version)
        .with_project_root(root);

    for plugin in layout.iter().flat_map(PluginRef::plugins) {
        let key = leaf_key(plugin.as_ref());
        if !plugin.supports(phase) {
            output.verbose_ctx(phase.command(), &format!("Skipping {}", key));
            continue;
        }

        output.verbose_ctx(phase.command(), &format!("Running {}", key));
        plugin.scaffold(phase, &mut ctx)?;
    }

    Ok(ctx.into_written())
}

#[derive(Serialize)]
struct FileReport {
    path: String,
    status: WriteStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScaffoldReport {
    command: &'static str,
    plugins: Vec<String>,
    files: Vec<FileReport>,
}

fn status_label(status: WriteStatus) -> &'static str {
    match status {
        WriteStatus::Created => "created",
        WriteStatus::Overwritten => "overwritten",
        WriteStatus::Skipped => "skipped",
    }
}

fn report(output: &Output, phase: Phase, root: &Path, layout: &[PluginRef], written: &[WriteOutcome]) {
    let files: Vec<FileReport> = written
        .iter()
        .map(|outcome| FileReport {
            path: outcome
                .path
                .strip_prefix(root)
                .unwrap_or(&outcome.path)
                .display()
                .to_string(),
            status: outcome.status,
        })
        .collect();

    if output.is_json() {
        output.data(&ScaffoldReport {
            command: phase.command(),
            plugins: layout.iter().map(PluginRef::key).collect(),
            files,
        });
        return;
    }

    for file in &files {
        println!("  {:<12} {}", status_label(file.status), file.path);
    }
    output.success(&format!(
        "Scaffolded {} file(s) for '{}'",
        files.len(),
        phase
    ));
}

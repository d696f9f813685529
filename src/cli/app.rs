//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::plugin_cmd;
use super::scaffold::{self, InitOptions};
use crate::plugin::{Phase, ProjectVersion};
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "scaffold")]
#[command(author, version, about = "Plugin-driven project scaffolding")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new project in the current directory
    Init {
        /// Plugin keys or names to scaffold with (comma separated)
        #[arg(long, value_delimiter = ',')]
        plugins: Vec<String>,

        /// Plugins to inject into the layout's dynamic bundle (comma separated)
        #[arg(long, value_delimiter = ',')]
        inject: Vec<String>,

        /// Project version to create
        #[arg(long, default_value = "3")]
        project_version: ProjectVersion,

        /// Project name recorded in the PROJECT file
        #[arg(long)]
        project_name: Option<String>,

        /// Arguments passed through to plugins
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Scaffold a new API or webhook
    #[command(subcommand)]
    Create(CreateCommands),

    /// Update an existing project
    Edit {
        /// Arguments passed through to plugins
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Manage plugins
    #[command(subcommand)]
    Plugin(plugin_cmd::PluginCommands),
}

#[derive(Subcommand)]
pub enum CreateCommands {
    /// Scaffold a Kubernetes API
    Api {
        /// Arguments passed through to plugins
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Scaffold a webhook for an API resource
    Webhook {
        /// Arguments passed through to plugins
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let format = cli
        .format
        .unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format, cli.verbose);

    output.verbose("scaffold starting");
    if let Some(root) = &config.project_root {
        output.verbose(&format!("Project root: {}", root.display()));
    }

    match cli.command {
        Commands::Init {
            plugins,
            inject,
            project_version,
            project_name,
            args,
        } => {
            output.verbose_ctx(
                "init",
                &format!(
                    "plugins={:?}, inject={:?}, project_version={}",
                    plugins, inject, project_version
                ),
            );
            scaffold::init(
                &config,
                &output,
                InitOptions {
                    plugins,
                    inject,
                    project_version,
                    project_name,
                    args,
                },
            )?
        }

        Commands::Create(CreateCommands::Api { args }) => {
            scaffold::run_in_project(&config, &output, Phase::CreateApi, args)?
        }
        Commands::Create(CreateCommands::Webhook { args }) => {
            scaffold::run_in_project(&config, &output, Phase::CreateWebhook, args)?
        }
        Commands::Edit { args } => scaffold::run_in_project(&config, &output, Phase::Edit, args)?,

        Commands::Plugin(cmd) => plugin_cmd::run(cmd, &config, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Sends library diagnostics to stderr, honoring `RUST_LOG`
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

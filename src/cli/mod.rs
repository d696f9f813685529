//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Phase | Purpose |
//! |---------|-------|---------|
//! | `init` | `init` | Create the `PROJECT` file and scaffold a new project |
//! | `create api` | `create api` | Scaffold an API in an existing project |
//! | `create webhook` | `create webhook` | Scaffold a webhook in an existing project |
//! | `edit` | `edit` | Update an existing project |
//! | `plugin list` / `plugin show` | | Inspect built-in and external plugins |
//!
//! Anything after the known flags (or after `--`) is passed to every plugin
//! of the layout as raw arguments.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! scaffold --verbose create api -- --group ship --kind Frigate
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod plugin_cmd;
mod scaffold;

pub use app::{run, Cli, Commands, CreateCommands};
pub use output::{Output, OutputFormat};

//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `init`: Create a `.devtrack/` workspace
//! - `add` / `remove`: Create or delete a dependency edge
//! - `list`: Edges mentioning a task
//! - `blocking` / `blocked` / `related`: Immediate neighbours of a task
//! - `check`: Whether a task is ready to start
//! - `tree`: Transitive prerequisites
//! - `purge`: Drop every edge of a deleted task
//! - `verify`: Whole-graph consistency check
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! devtrack-deps add proj-b2 proj-a1 --type blocks
//! devtrack-deps check proj-b2
//! devtrack-deps tree proj-b2 --depth 3
//! ```

mod args;
mod execute;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    AddArgs, BackendArg, DependencyTypeArg, InitArgs, ListArgs, RemoveArgs, TaskArgs, TreeArgs,
    validate_task_id,
};

use crate::app::App;
use crate::output::OutputMode;

/// Task dependency graph for DevTrack
///
/// Records which tasks must finish before others, refuses edges that would
/// create a cycle, and answers "what is blocking this task".
#[derive(Parser, Debug)]
#[command(name = "devtrack-deps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a workspace
    ///
    /// Creates `.devtrack/` with configuration, an empty edge store and an
    /// empty task export.
    Init(InitArgs),

    /// Add a dependency between two tasks
    ///
    /// `add A B` (type blocks) means A waits on B. `--type blocked-by`
    /// reverses that, and `--type relates-to` links without ordering.
    Add(AddArgs),

    /// Remove a dependency by edge id
    Remove(RemoveArgs),

    /// List every dependency mentioning a task
    List(ListArgs),

    /// Show the immediate prerequisites of a task
    Blocking(TaskArgs),

    /// Show the tasks waiting on a task
    Blocked(TaskArgs),

    /// Show tasks related to a task without ordering
    Related(TaskArgs),

    /// Report whether a task has unfinished prerequisites
    Check(TaskArgs),

    /// Show transitive prerequisites as a tree
    Tree(TreeArgs),

    /// Remove every dependency of a deleted task
    Purge(TaskArgs),

    /// Check the whole graph for cycles and unknown tasks
    Verify,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns clap's error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns any error from loading the workspace or running the command.
    pub async fn execute(&self) -> Result<()> {
        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        if let Commands::Init(args) = &self.command {
            return execute::execute_init(args, output_mode).await;
        }

        let app = App::from_directory(&std::env::current_dir()?).await?;
        match &self.command {
            Commands::Init(_) => Ok(()),
            Commands::Add(args) => execute::execute_add(&app, args, output_mode).await,
            Commands::Remove(args) => execute::execute_remove(&app, args, output_mode).await,
            Commands::List(args) => execute::execute_list(&app, args, output_mode).await,
            Commands::Blocking(args) => execute::execute_blocking(&app, args, output_mode).await,
            Commands::Blocked(args) => execute::execute_blocked(&app, args, output_mode).await,
            Commands::Related(args) => execute::execute_related(&app, args, output_mode).await,
            Commands::Check(args) => execute::execute_check(&app, args, output_mode).await,
            Commands::Tree(args) => execute::execute_tree(&app, args, output_mode).await,
            Commands::Purge(args) => execute::execute_purge(&app, args, output_mode).await,
            Commands::Verify => execute::execute_verify(&app, output_mode).await,
        }?;
        app.save().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add_with_type() {
        let cli = Cli::try_parse_from(["devtrack-deps", "add", "t1", "t2", "--type", "blocked-by"])
            .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.task, "t1");
                assert_eq!(args.depends_on, "t2");
                assert_eq!(args.dep_type, DependencyTypeArg::BlockedBy);
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn add_defaults_to_blocks() {
        let cli = Cli::try_parse_from(["devtrack-deps", "add", "t1", "t2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Add(AddArgs {
                dep_type: DependencyTypeArg::Blocks,
                ..
            })
        ));
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["devtrack-deps", "check", "t1", "--json"]).unwrap();
        assert!(cli.json);
    }

    #[test]
    fn tree_depth_must_be_positive() {
        assert!(Cli::try_parse_from(["devtrack-deps", "tree", "t1", "--depth", "0"]).is_err());
        let cli = Cli::try_parse_from(["devtrack-deps", "tree", "t1", "-d", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Tree(TreeArgs { depth: Some(2), .. })));
    }

    #[test]
    fn blank_task_id_rejected() {
        assert!(Cli::try_parse_from(["devtrack-deps", "blocking", ""]).is_err());
    }

    #[test]
    fn init_backend_choices() {
        let cli = Cli::try_parse_from(["devtrack-deps", "init", "--backend", "jsonl"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Init(InitArgs {
                backend: BackendArg::Jsonl,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["devtrack-deps", "init", "--backend", "postgres"]).is_err());
    }
}

//! CLI argument structs and value enums.

use clap::{Parser, ValueEnum};

use crate::config::BackendKind;
use crate::domain::DependencyType;

/// Validate a task id given on the command line.
///
/// # Errors
///
/// Returns a message if the id is empty or contains whitespace.
pub fn validate_task_id(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("task id cannot be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("task id '{s}' cannot contain whitespace"));
    }
    Ok(s.to_string())
}

/// Dependency type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyTypeArg {
    /// The task waits on the other task
    Blocks,
    /// The other task waits on this task
    #[value(name = "blocked-by", alias = "blocked_by")]
    BlockedBy,
    /// Informational link, no ordering
    #[value(name = "relates-to", alias = "related")]
    RelatesTo,
}

impl From<DependencyTypeArg> for DependencyType {
    fn from(arg: DependencyTypeArg) -> Self {
        match arg {
            DependencyTypeArg::Blocks => Self::Blocks,
            DependencyTypeArg::BlockedBy => Self::BlockedBy,
            DependencyTypeArg::RelatesTo => Self::RelatesTo,
        }
    }
}

/// Storage backend for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// `SQLite` database
    Sqlite,
    /// JSONL file
    Jsonl,
    /// Nothing persisted
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => Self::Sqlite,
            BackendArg::Jsonl => Self::Jsonl,
            BackendArg::Memory => Self::Memory,
        }
    }
}

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Edge id prefix (e.g., "dep" for "dep-k3f9az")
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Storage backend
    #[arg(short, long, value_enum, default_value = "sqlite")]
    pub backend: BackendArg,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `add` command
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// Subject task
    #[arg(value_parser = validate_task_id)]
    pub task: String,

    /// Object task
    #[arg(value_parser = validate_task_id)]
    pub depends_on: String,

    /// Relationship label
    #[arg(short = 't', long = "type", value_enum, default_value = "blocks")]
    pub dep_type: DependencyTypeArg,
}

/// Arguments for the `remove` command
#[derive(Parser, Debug, Clone)]
pub struct RemoveArgs {
    /// Edge id
    pub edge_id: String,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Task to list dependencies for
    #[arg(value_parser = validate_task_id)]
    pub task: String,

    /// Include the other task's title, status and role
    #[arg(short, long)]
    pub details: bool,
}

/// Arguments for commands that take a single task
#[derive(Parser, Debug, Clone)]
pub struct TaskArgs {
    /// Task id
    #[arg(value_parser = validate_task_id)]
    pub task: String,
}

/// Arguments for the `tree` command
#[derive(Parser, Debug, Clone)]
pub struct TreeArgs {
    /// Task whose prerequisites to show
    #[arg(value_parser = validate_task_id)]
    pub task: String,

    /// Maximum depth (unbounded if omitted)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub depth: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("t1", true)]
    #[case("proj-a3f8", true)]
    #[case("", false)]
    #[case("two words", false)]
    fn task_id_validation(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(validate_task_id(input).is_ok(), ok);
    }

    #[test]
    fn arg_enums_map_to_domain() {
        assert_eq!(DependencyType::from(DependencyTypeArg::BlockedBy), DependencyType::BlockedBy);
        assert_eq!(BackendKind::from(BackendArg::Jsonl), BackendKind::Jsonl);
    }
}

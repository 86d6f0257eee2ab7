//! Output formatting for the CLI.
//!
//! Color theme:
//!   - green: completed tasks, success messages
//!   - yellow: in-progress tasks
//!   - red: blocked state, problems
//!   - cyan: ids
//!   - dimmed: labels, connectors

use crate::domain::{DependencyType, TaskStatus};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Output mode for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print a value as pretty JSON on stdout
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut handle = io::stdout().lock();
    writeln!(handle, "{json}")
}

/// Render an id.
pub fn id(text: &str) -> String {
    text.cyan().to_string()
}

/// Render a success message.
pub fn success(text: &str) -> String {
    text.green().to_string()
}

/// Render a problem.
pub fn problem(text: &str) -> String {
    text.red().to_string()
}

/// Render a muted label or connector.
pub fn muted(text: &str) -> String {
    text.dimmed().to_string()
}

/// Render a task status in its theme color.
pub fn status(status: TaskStatus) -> String {
    let text = status.as_str();
    match status {
        TaskStatus::NotStarted => text.white().to_string(),
        TaskStatus::InProgress => text.yellow().to_string(),
        TaskStatus::Paused => text.dimmed().to_string(),
        TaskStatus::Completed => text.green().to_string(),
    }
}

/// Render a dependency label.
pub fn dep_type(dep_type: DependencyType) -> String {
    let text = dep_type.as_str();
    if dep_type.is_ordering() {
        text.bold().to_string()
    } else {
        text.italic().to_string()
    }
}

/// Indentation prefix for a tree entry at `depth` (1-based).
pub fn tree_prefix(depth: usize) -> String {
    format!("{}{}", "  ".repeat(depth.saturating_sub(1)), muted("└─ "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::control::set_override;

    #[test]
    fn plain_rendering_without_colors() {
        set_override(false);
        assert_eq!(status(TaskStatus::Completed), "completed");
        assert_eq!(dep_type(DependencyType::BlockedBy), "blocked-by");
        assert_eq!(tree_prefix(1), "└─ ");
        assert_eq!(tree_prefix(3), "    └─ ");
        set_override(true);
        assert!(id("dep-1").contains("dep-1"));
        colored::control::unset_override();
    }
}

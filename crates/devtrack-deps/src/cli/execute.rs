//! Command execution logic.

use anyhow::{Result, bail};
use serde_json::json;

use super::args::{AddArgs, InitArgs, ListArgs, RemoveArgs, TaskArgs, TreeArgs};
use crate::app::App;
use crate::domain::{EdgeId, TaskId, TaskState};
use crate::output::{self, OutputMode};
use crate::tasks::{TaskDeletionHook, TaskLookup};

/// Execute the init command
pub async fn execute_init(args: &InitArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir, args.prefix.as_deref(), args.backend.into()).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&json!({
            "devtrack_dir": result.devtrack_dir.display().to_string(),
            "config_file": result.config_file.display().to_string(),
            "data_file": result.data_file.as_ref().map(|p| p.display().to_string()),
            "tasks_file": result.tasks_file.display().to_string(),
            "prefix": result.prefix,
            "backend": result.backend,
        }))?,
        OutputMode::Text if args.quiet => {}
        OutputMode::Text => {
            println!("Initialized devtrack in {}", result.devtrack_dir.display());
            println!("  Config:  {}", result.config_file.display());
            if let Some(data_file) = &result.data_file {
                println!("  Edges:   {}", data_file.display());
            }
            println!("  Tasks:   {}", result.tasks_file.display());
            println!("  Prefix:  {}", result.prefix);
        }
    }
    Ok(())
}

/// Execute the add command
pub async fn execute_add(app: &App, args: &AddArgs, output_mode: OutputMode) -> Result<()> {
    let edge = app
        .manager()
        .create(args.task.as_str(), args.depends_on.as_str(), args.dep_type.into())
        .await?;

    match output_mode {
        OutputMode::Json => output::print_json(&edge)?,
        OutputMode::Text => println!(
            "{} {}: {} {} {}",
            output::success("Added"),
            output::id(edge.id.as_str()),
            edge.task_id,
            output::dep_type(edge.dep_type),
            edge.depends_on_task_id
        ),
    }
    Ok(())
}

/// Execute the remove command
pub async fn execute_remove(app: &App, args: &RemoveArgs, output_mode: OutputMode) -> Result<()> {
    let edge = app.manager().delete(&EdgeId::new(args.edge_id.as_str())).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&edge)?,
        OutputMode::Text => println!(
            "{} {}: {} {} {}",
            output::success("Removed"),
            output::id(edge.id.as_str()),
            edge.task_id,
            output::dep_type(edge.dep_type),
            edge.depends_on_task_id
        ),
    }
    Ok(())
}

/// Execute the list command
pub async fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());

    if args.details {
        let details = app.manager().list_for_task_with_details(&task).await?;
        match output_mode {
            OutputMode::Json => output::print_json(&details)?,
            OutputMode::Text if details.is_empty() => println!("No dependencies for {task}"),
            OutputMode::Text => {
                for d in &details {
                    println!(
                        "{}  {:<12} {} {} ({})",
                        output::id(d.edge.id.as_str()),
                        output::muted(&d.role.to_string()),
                        output::id(d.counterpart.id.as_str()),
                        d.counterpart.title,
                        output::status(d.counterpart.status)
                    );
                }
            }
        }
        return Ok(());
    }

    let edges = app.manager().list_for_task(&task).await?;
    match output_mode {
        OutputMode::Json => output::print_json(&edges)?,
        OutputMode::Text if edges.is_empty() => println!("No dependencies for {task}"),
        OutputMode::Text => {
            for edge in &edges {
                println!(
                    "{}  {} {} {}",
                    output::id(edge.id.as_str()),
                    edge.task_id,
                    output::dep_type(edge.dep_type),
                    edge.depends_on_task_id
                );
            }
        }
    }
    Ok(())
}

fn print_states(heading: &str, states: &[TaskState], output_mode: OutputMode) -> Result<()> {
    match output_mode {
        OutputMode::Json => output::print_json(&states)?,
        OutputMode::Text if states.is_empty() => println!("{}", output::muted("(none)")),
        OutputMode::Text => {
            println!("{heading}:");
            for state in states {
                println!("  {} {}", output::id(state.id.as_str()), output::status(state.status));
            }
        }
    }
    Ok(())
}

/// Execute the blocking command
pub async fn execute_blocking(app: &App, args: &TaskArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let states = app.manager().blocking_tasks(&task).await?;
    print_states(&format!("Prerequisites of {task}"), &states, output_mode)
}

/// Execute the blocked command
pub async fn execute_blocked(app: &App, args: &TaskArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let states = app.manager().blocked_tasks(&task).await?;
    print_states(&format!("Waiting on {task}"), &states, output_mode)
}

/// Execute the related command
pub async fn execute_related(app: &App, args: &TaskArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let states = app.manager().related_tasks(&task).await?;
    print_states(&format!("Related to {task}"), &states, output_mode)
}

/// Execute the check command
pub async fn execute_check(app: &App, args: &TaskArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let blocked = app.manager().has_blocking_dependencies(&task).await?;
    let pending: Vec<TaskState> = app
        .manager()
        .blocking_tasks(&task)
        .await?
        .into_iter()
        .filter(|state| !state.status.is_completed())
        .collect();

    match output_mode {
        OutputMode::Json => output::print_json(&json!({
            "task": task,
            "blocked": blocked,
            "pending": pending,
        }))?,
        OutputMode::Text if blocked => {
            println!("{} {}", output::id(task.as_str()), output::problem("is blocked by:"));
            for state in &pending {
                println!("  {} {}", output::id(state.id.as_str()), output::status(state.status));
            }
        }
        OutputMode::Text => {
            println!("{} {}", output::id(task.as_str()), output::success("is ready"));
        }
    }
    Ok(())
}

/// Execute the tree command
pub async fn execute_tree(app: &App, args: &TreeArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let tree = app
        .manager()
        .dependency_tree(&task, args.depth.map(usize::from))
        .await?;

    match output_mode {
        OutputMode::Json => output::print_json(&tree)?,
        OutputMode::Text => {
            println!("{}", output::id(task.as_str()));
            for node in &tree {
                let status = app.manager().tasks().task_status(&node.task_id).await?;
                println!(
                    "{}{} {}",
                    output::tree_prefix(node.depth),
                    output::id(node.task_id.as_str()),
                    status.map(output::status).unwrap_or_else(|| output::problem("missing"))
                );
            }
        }
    }
    Ok(())
}

/// Execute the purge command
pub async fn execute_purge(app: &App, args: &TaskArgs, output_mode: OutputMode) -> Result<()> {
    let task = TaskId::new(args.task.as_str());
    let removed = app.manager().on_task_deleted(&task).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&json!({ "task": task, "removed": removed }))?,
        OutputMode::Text => println!(
            "{} {removed} dependencies of {}",
            output::success("Purged"),
            output::id(task.as_str())
        ),
    }
    Ok(())
}

/// Execute the verify command
pub async fn execute_verify(app: &App, output_mode: OutputMode) -> Result<()> {
    let report = app.manager().verify().await?;

    match output_mode {
        OutputMode::Json => output::print_json(&report)?,
        OutputMode::Text => {
            println!(
                "{} edges, {} ordering",
                report.edges, report.precedence_edges
            );
            if !report.cycle.is_empty() {
                let members: Vec<&str> = report.cycle.iter().map(TaskId::as_str).collect();
                println!("{} {}", output::problem("cycle among:"), members.join(", "));
            }
            for edge in &report.dangling {
                println!(
                    "{} {}",
                    output::problem("references unknown task:"),
                    output::id(edge.as_str())
                );
            }
            if report.is_healthy() {
                println!("{}", output::success("OK"));
            }
        }
    }

    if !report.is_healthy() {
        bail!("dependency graph failed verification");
    }
    Ok(())
}

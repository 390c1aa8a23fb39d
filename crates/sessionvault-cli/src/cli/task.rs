//! Task server lifecycle subcommands.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use sessionvault_types::id::TaskId;
use sessionvault_types::session::TaskStatus;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Archive a task server (soft delete; it stays in the session).
    Archive {
        /// Task id.
        task: String,
    },

    /// Mark a task as completed.
    Complete {
        /// Task id.
        task: String,
    },

    /// Set or clear the current phase of a task.
    Phase {
        /// Task id.
        task: String,

        /// New phase. Omit to clear.
        phase: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Active,
    Completed,
    Archived,
}

impl From<StatusFilter> for TaskStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Active => TaskStatus::Active,
            StatusFilter::Completed => TaskStatus::Completed,
            StatusFilter::Archived => TaskStatus::Archived,
        }
    }
}

pub async fn handle_task_command(cmd: TaskCommand, state: &AppState, json: bool) -> Result<()> {
    let (task, action, changed) = match cmd {
        TaskCommand::Archive { task } => {
            let changed = state
                .store
                .archive_task_server(TaskId::from(task.as_str()))
                .await
                .with_context(|| format!("Failed to archive task '{task}'"))?;
            (task, "archived", changed)
        }
        TaskCommand::Complete { task } => {
            let changed = state
                .store
                .complete_task_server(TaskId::from(task.as_str()))
                .await
                .with_context(|| format!("Failed to complete task '{task}'"))?;
            (task, "completed", changed)
        }
        TaskCommand::Phase { task, phase } => {
            let changed = state
                .store
                .update_task_phase(TaskId::from(task.as_str()), phase)
                .await
                .with_context(|| format!("Failed to update phase of task '{task}'"))?;
            (task, "updated", changed)
        }
    };

    if json {
        let out = serde_json::json!({
            "task_id": task,
            "action": action,
            "changed": changed,
            "state": state.store.task_server_state(&TaskId::from(task.as_str())),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if changed {
        println!(
            "{} Task '{}' {}",
            style("✓").green().bold(),
            style(&task).cyan(),
            action
        );
    } else {
        println!(
            "{} Task '{}' unchanged (unknown or already {})",
            style("i").blue().bold(),
            style(&task).cyan(),
            action
        );
    }
    Ok(())
}

/// List task servers, optionally filtered by status.
pub async fn list_tasks(state: &AppState, status: Option<StatusFilter>, json: bool) -> Result<()> {
    let session = state.store.current_session().context("No active session")?;
    let wanted = status.map(TaskStatus::from);
    let tasks: Vec<_> = session
        .task_server_states
        .iter()
        .filter(|t| wanted.is_none_or(|s| t.status == s))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!();
        println!(
            "  {} No task servers. Add one with: {}",
            style("i").blue().bold(),
            style("svault server add <id> <name> --task <task-id>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Task").fg(Color::White),
        Cell::new("Server").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Phase").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Agents").fg(Color::White),
    ]);

    for task in &tasks {
        let status_cell = match task.status {
            TaskStatus::Active => Cell::new("● active").fg(Color::Green),
            TaskStatus::Completed => Cell::new("✓ completed").fg(Color::Blue),
            TaskStatus::Archived => Cell::new("◌ archived").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&task.task_id).fg(Color::Cyan),
            Cell::new(&task.server_id),
            Cell::new(&task.task_type),
            Cell::new(task.phase.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
            status_cell,
            Cell::new(task.agent_channels.len()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} task{}",
        style(tasks.len()).bold(),
        if tasks.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

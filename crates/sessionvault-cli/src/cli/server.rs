//! Server and channel subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;

use sessionvault_core::session::service::DEFAULT_TASK_TYPE;
use sessionvault_types::id::ServerId;
use sessionvault_types::session::{ChannelState, ChannelType, ServerState};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ServerCommand {
    /// Add a server (regular unless --task is given).
    Add {
        /// Server id.
        id: String,

        /// Display name (sanitized before storage).
        name: String,

        /// Bind the server to this task id.
        #[arg(long)]
        task: Option<String>,

        /// Task type recorded for task servers.
        #[arg(long, requires = "task")]
        task_type: Option<String>,

        /// Initial task phase.
        #[arg(long, requires = "task")]
        phase: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ChannelCommand {
    /// Add a channel to an existing server.
    Add {
        /// Owning server id.
        server: String,

        /// Channel id.
        id: String,

        /// Display name (sanitized before storage).
        name: String,

        /// Channel type: agent, progress, planning, dm, general.
        #[arg(long = "type", default_value = "general")]
        channel_type: ChannelType,

        /// Agent role, for agent channels.
        #[arg(long)]
        role: Option<String>,
    },
}

pub async fn handle_server_command(cmd: ServerCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ServerCommand::Add {
            id,
            name,
            task,
            task_type,
            phase,
        } => {
            match task {
                Some(task_id) => {
                    let server = ServerState::task(id.as_str(), name, task_id);
                    let task_type = task_type.unwrap_or_else(|| DEFAULT_TASK_TYPE.to_string());
                    state.store.add_task_server(server, task_type, phase).await
                }
                None => state.store.add_server(ServerState::regular(id.as_str(), name)).await,
            }
            .with_context(|| format!("Failed to add server '{id}'"))?;

            print_server(state, &ServerId::from(id.as_str()), json)
        }
    }
}

pub async fn handle_channel_command(
    cmd: ChannelCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ChannelCommand::Add {
            server,
            id,
            name,
            channel_type,
            role,
        } => {
            let mut channel = ChannelState::new(id.as_str(), name, channel_type);
            channel.agent_role = role;
            let server_id = ServerId::from(server.as_str());
            state
                .store
                .add_channel(server_id.clone(), channel)
                .await
                .with_context(|| format!("Failed to add channel '{id}' to server '{server}'"))?;

            print_server(state, &server_id, json)
        }
    }
}

/// Print a server as stored after sanitization.
fn print_server(state: &AppState, server_id: &ServerId, json: bool) -> Result<()> {
    let session = state
        .store
        .current_session()
        .context("No active session")?;
    let server = session
        .server(server_id)
        .with_context(|| format!("Server '{server_id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(server)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} {}",
        style("✓").green().bold(),
        style(&server.server_name).cyan().bold(),
        style(format!("({}, {})", server.server_id, server.server_type)).dim()
    );
    for channel in &server.channels {
        println!(
            "    {} #{} {}",
            style("•").dim(),
            channel.channel_name,
            style(format!("[{}]", channel.channel_type)).dim()
        );
    }
    println!();
    Ok(())
}

//! Message history and file-context subcommands.
//!
//! Content is sanitized by the session store before it is persisted; the
//! commands print the stored copy so the user sees what was actually kept.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use uuid::Uuid;

use sessionvault_types::id::{ChannelId, ContextId, MessageId, ServerId};
use sessionvault_types::session::{FileContextState, MessageHistoryState, MessageRole};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Append a message to a channel.
    Add {
        /// Server id.
        server: String,

        /// Channel id.
        channel: String,

        /// Author: user or assistant.
        role: MessageRole,

        /// Message text.
        content: String,

        /// Provider that produced the message.
        #[arg(long)]
        provider: Option<String>,

        /// File context this message refers to.
        #[arg(long)]
        context: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ContextCommand {
    /// Attach a set of file references to the conversation.
    Add {
        /// Referenced path (repeatable). `..` segments are rejected.
        #[arg(long = "path", required = true)]
        paths: Vec<String>,

        /// Summary of the referenced files.
        #[arg(long)]
        summary: String,

        /// Message the context belongs to.
        #[arg(long)]
        message: Option<String>,
    },
}

pub async fn handle_message_command(
    cmd: MessageCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        MessageCommand::Add {
            server,
            channel,
            role,
            content,
            provider,
            context,
        } => {
            let mut message = MessageHistoryState::new(
                Uuid::now_v7().to_string(),
                server.as_str(),
                channel.as_str(),
                role,
                content,
            );
            message.provider_id = provider;
            message.context_id = context.map(ContextId::from);

            let stored = state
                .store
                .add_message(message)
                .await
                .with_context(|| format!("Failed to add message to {server}/{channel}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
                return Ok(());
            }
            println!(
                "{} Message {} added to {}",
                style("✓").green().bold(),
                style(&stored.message_id).dim(),
                style(format!("{server}/#{channel}")).cyan()
            );
            if !stored.sanitized {
                println!(
                    "{} Sanitizer failed; content was stored unmodified",
                    style("!").yellow().bold()
                );
            }
            Ok(())
        }
    }
}

/// Print the history of one channel, oldest first.
pub async fn history(
    state: &AppState,
    server: &str,
    channel: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut messages = state
        .store
        .channel_history(&ServerId::from(server), &ChannelId::from(channel));
    if let Some(limit) = limit {
        let skip = messages.len().saturating_sub(limit);
        messages.drain(..skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!(
            "{} No messages in {}",
            style("i").blue().bold(),
            style(format!("{server}/#{channel}")).cyan()
        );
        return Ok(());
    }

    println!();
    for message in &messages {
        let author = match message.role {
            MessageRole::User => style("you".to_string()).green().bold(),
            MessageRole::Assistant => style(
                message
                    .provider_id
                    .clone()
                    .unwrap_or_else(|| "assistant".to_string()),
            )
            .magenta()
            .bold(),
        };
        println!(
            "  {} {}",
            style(message.timestamp.format("%H:%M:%S")).dim(),
            author
        );
        for line in message.content.lines() {
            println!("    {line}");
        }
    }
    println!();
    Ok(())
}

pub async fn handle_context_command(
    cmd: ContextCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ContextCommand::Add {
            paths,
            summary,
            message,
        } => {
            let mut context = FileContextState::new(Uuid::now_v7().to_string(), paths, summary);
            context.associated_message_id = message.map(MessageId::from);

            let stored = state
                .store
                .add_file_context(context)
                .await
                .context("Failed to add file context")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
                return Ok(());
            }
            println!(
                "{} Context {} added ({} file{})",
                style("✓").green().bold(),
                style(&stored.context_id).dim(),
                stored.file_paths.len(),
                if stored.file_paths.len() == 1 { "" } else { "s" }
            );
            if stored.threat_count > 0 {
                println!(
                    "{} Removed {} threat{} from the summary",
                    style("!").yellow().bold(),
                    stored.threat_count,
                    if stored.threat_count == 1 { "" } else { "s" }
                );
            }
            Ok(())
        }
    }
}

//! Whole-session commands: show, use, clear, watch.

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use sessionvault_core::session::ValidationScheduler;
use sessionvault_types::id::{ChannelId, ServerId};

use crate::state::AppState;

/// Print every server with its channels.
pub async fn show(state: &AppState, json: bool) -> Result<()> {
    let session = state.store.current_session().context("No active session")?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.as_ref())?);
        return Ok(());
    }

    if session.servers.is_empty() {
        println!();
        println!(
            "  {} Session is empty. Add a server with: {}",
            style("i").blue().bold(),
            style("svault server add <id> <name>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Server").fg(Color::White),
        Cell::new("Channel").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Last Message").fg(Color::White),
    ]);

    for server in &session.servers {
        let active_server = session.active_server_id.as_ref() == Some(&server.server_id);
        let label = if server.archived {
            Cell::new(format!("◌ {}", server.server_name)).fg(Color::DarkGrey)
        } else if active_server {
            Cell::new(format!("▸ {}", server.server_name)).fg(Color::Green)
        } else {
            Cell::new(&server.server_name).fg(Color::Cyan)
        };

        if server.channels.is_empty() {
            table.add_row(vec![label, Cell::new("-"), Cell::new(""), Cell::new(0), Cell::new("")]);
            continue;
        }

        for (i, channel) in server.channels.iter().enumerate() {
            let server_cell = if i == 0 { label.clone() } else { Cell::new("") };
            let active_channel =
                active_server && session.active_channel_id.as_ref() == Some(&channel.channel_id);
            let name = if active_channel {
                Cell::new(format!("#{} ●", channel.channel_name)).fg(Color::Green)
            } else {
                Cell::new(format!("#{}", channel.channel_name))
            };
            table.add_row(vec![
                server_cell,
                name,
                Cell::new(channel.channel_type).fg(Color::DarkGrey),
                Cell::new(channel.message_count),
                Cell::new(&channel.last_message).fg(Color::DarkGrey),
            ]);
        }
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} {}",
        style("Session").bold(),
        style(session.session_id).dim()
    );
    println!();
    Ok(())
}

/// Set the active server and channel.
pub async fn use_channel(
    state: &AppState,
    server: String,
    channel: Option<String>,
    json: bool,
) -> Result<()> {
    state
        .store
        .set_active_channel(ServerId::from(server.as_str()), channel.as_deref().map(ChannelId::from))
        .await
        .with_context(|| format!("Failed to switch to server '{server}'"))?;

    if json {
        let out = serde_json::json!({ "server": server, "channel": channel });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let target = match &channel {
        Some(channel) => format!("{server}/#{channel}"),
        None => server.clone(),
    };
    println!("{} Now using {}", style("✓").green().bold(), style(target).cyan());
    Ok(())
}

/// Delete the persisted session after confirmation.
pub async fn clear(state: &AppState, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete the session in {}?",
                style(state.data_dir.display()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    state
        .store
        .clear_session()
        .await
        .context("Failed to clear session")?;

    if json {
        println!("{}", serde_json::json!({ "cleared": true }));
    } else {
        println!("{} Session cleared", style("✓").green().bold());
    }
    Ok(())
}

/// Run periodic validation until Ctrl-C or SIGTERM.
pub async fn watch(state: &AppState, interval: Option<u64>, json: bool) -> Result<()> {
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.config.validation_interval());
    let scheduler = ValidationScheduler::start(state.store.clone(), interval);

    if !json {
        println!(
            "{} Validating every {}s. Press Ctrl-C to stop.",
            style("●").green().bold(),
            interval.as_secs()
        );
    }

    shutdown_signal().await;
    scheduler.shutdown().await;

    // Final save so the next start is inside the staleness window.
    state
        .store
        .save_session()
        .await
        .context("Failed to save session on shutdown")?;

    if json {
        println!("{}", serde_json::json!({ "stopped": true }));
    } else {
        println!("{} Stopped", style("✓").green().bold());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

//! SessionVault CLI entry point.
//!
//! Binary name: `svault`
//!
//! Parses arguments, opens the encrypted session store, restores or creates
//! the workspace session, then dispatches to a command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use sessionvault_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::{AppState, StateOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,sessionvault_core=debug,sessionvault_infra=debug",
        _ => "trace",
    };
    let tracing_options = TracingOptions::new(filter)
        .json(cli.log_json)
        .otel(cli.otel);
    init_tracing(&tracing_options)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need the store.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "svault", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(StateOptions {
        keychain: cli.keychain,
        ephemeral: cli.ephemeral,
    })
    .await?;

    let result = dispatch(cli, &state).await;
    state.close().await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli, state: &AppState) -> anyhow::Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Status => cli::status::status(state, json).await,
        Commands::Show => cli::session::show(state, json).await,
        Commands::Server { action } => cli::server::handle_server_command(action, state, json).await,
        Commands::Channel { action } => {
            cli::server::handle_channel_command(action, state, json).await
        }
        Commands::Task { action } => cli::task::handle_task_command(action, state, json).await,
        Commands::Tasks { status } => cli::task::list_tasks(state, status, json).await,
        Commands::Message { action } => {
            cli::message::handle_message_command(action, state, json).await
        }
        Commands::History {
            server,
            channel,
            limit,
        } => cli::message::history(state, &server, &channel, limit, json).await,
        Commands::Context { action } => {
            cli::message::handle_context_command(action, state, json).await
        }
        Commands::Use { server, channel } => {
            cli::session::use_channel(state, server, channel, json).await
        }
        Commands::Clear { force } => cli::session::clear(state, force, json).await,
        Commands::Watch { interval } => cli::session::watch(state, interval, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}

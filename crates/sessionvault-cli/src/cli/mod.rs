//! CLI command definitions for the `svault` binary.
//!
//! Uses clap derive macros. Top-level verbs read the session (`status`,
//! `show`, `history`, `tasks`), noun groups mutate it (`server add`,
//! `message add`, `task archive`).

pub mod message;
pub mod server;
pub mod session;
pub mod status;
pub mod task;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use task::StatusFilter;

/// Inspect and edit the encrypted chat workspace session.
#[derive(Parser)]
#[command(name = "svault", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Take the vault key from the OS keychain instead of the key file.
    #[arg(long, global = true)]
    pub keychain: bool,

    /// Keep the session in memory only (nothing is written to disk).
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Write log lines to stderr as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show restore outcome, security metadata, and storage details.
    Status,

    /// Print the servers and channels of the current session.
    Show,

    /// Manage servers.
    Server {
        #[command(subcommand)]
        action: server::ServerCommand,
    },

    /// Manage channels.
    Channel {
        #[command(subcommand)]
        action: server::ChannelCommand,
    },

    /// Task server lifecycle (archive, complete, phase).
    Task {
        #[command(subcommand)]
        action: task::TaskCommand,
    },

    /// List task servers.
    Tasks {
        /// Only show tasks with this status.
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
    },

    /// Add messages to the history.
    Message {
        #[command(subcommand)]
        action: message::MessageCommand,
    },

    /// Show the message history of one channel.
    History {
        /// Server id.
        server: String,

        /// Channel id.
        channel: String,

        /// Show only the most recent N messages.
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Manage file-reference contexts.
    Context {
        #[command(subcommand)]
        action: message::ContextCommand,
    },

    /// Set the active server and, optionally, channel.
    Use {
        /// Server id.
        server: String,

        /// Channel id within the server.
        channel: Option<String>,
    },

    /// Delete the persisted session and start empty.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Keep the session alive with periodic validation until Ctrl-C.
    Watch {
        /// Seconds between validations (defaults to the configured interval).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

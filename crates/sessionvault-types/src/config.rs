//! Configuration types for SessionVault.
//!
//! `SessionConfig` is the `[session]` table of `config.toml`. Every field has a
//! default matching the documented store behaviour.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level `config.toml` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub session: SessionConfig,
}

/// Tunables for the session store and its validation scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum age of the security metadata accepted on restore, and the
    /// period of the keep-alive re-save.
    #[serde(default = "default_validation_interval_secs")]
    pub validation_interval_secs: u64,

    /// Message history cap (oldest evicted first).
    #[serde(default = "default_max_message_history")]
    pub max_message_history: usize,

    /// File context cap (oldest evicted first).
    #[serde(default = "default_max_file_contexts")]
    pub max_file_contexts: usize,

    /// Length of `ChannelState::last_message` previews, in characters.
    #[serde(default = "default_preview_chars")]
    pub last_message_preview_chars: usize,

    /// Upper bound for sanitized server/channel display names.
    #[serde(default = "default_display_name_max_chars")]
    pub display_name_max_chars: usize,

    /// Capacity of the session actor's command queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_validation_interval_secs() -> u64 {
    300
}

fn default_max_message_history() -> usize {
    1000
}

fn default_max_file_contexts() -> usize {
    100
}

fn default_preview_chars() -> usize {
    100
}

fn default_display_name_max_chars() -> usize {
    100
}

fn default_command_buffer() -> usize {
    64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validation_interval_secs: default_validation_interval_secs(),
            max_message_history: default_max_message_history(),
            max_file_contexts: default_max_file_contexts(),
            last_message_preview_chars: default_preview_chars(),
            display_name_max_chars: default_display_name_max_chars(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl SessionConfig {
    /// Clamp zero values to 1 so caps and intervals stay meaningful.
    pub fn normalized(mut self) -> Self {
        self.validation_interval_secs = self.validation_interval_secs.max(1);
        self.max_message_history = self.max_message_history.max(1);
        self.max_file_contexts = self.max_file_contexts.max(1);
        self.last_message_preview_chars = self.last_message_preview_chars.max(1);
        self.display_name_max_chars = self.display_name_max_chars.max(1);
        self.command_buffer = self.command_buffer.max(1);
        self
    }

    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }
}

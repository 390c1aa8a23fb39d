//! Chat workspace session model.
//!
//! A [`ChatSession`] is the single durable aggregate of one workspace: the
//! servers and the channels they own, task-server lifecycles, bounded message
//! history, bounded file contexts, and user preferences. It is serialized as
//! camelCase JSON so the persisted payload mirrors the model field-for-field.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, ContextId, MessageId, ServerId, SessionId, TaskId};

/// Whether a server is static or bound to a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Task,
    Regular,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Task => write!(f, "task"),
            ServerType::Regular => write!(f, "regular"),
        }
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(ServerType::Task),
            "regular" => Ok(ServerType::Regular),
            other => Err(format!("invalid server type: '{other}'")),
        }
    }
}

/// Purpose of a channel within its server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Agent,
    Progress,
    Planning,
    Dm,
    General,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Agent => write!(f, "agent"),
            ChannelType::Progress => write!(f, "progress"),
            ChannelType::Planning => write!(f, "planning"),
            ChannelType::Dm => write!(f, "dm"),
            ChannelType::General => write!(f, "general"),
        }
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" => Ok(ChannelType::Agent),
            "progress" => Ok(ChannelType::Progress),
            "planning" => Ok(ChannelType::Planning),
            "dm" => Ok(ChannelType::Dm),
            "general" => Ok(ChannelType::General),
            other => Err(format!("invalid channel type: '{other}'")),
        }
    }
}

/// Lifecycle status of a task server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Completed,
    Archived,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Archived => write!(f, "archived"),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Active
    }
}

/// Author of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A channel: a named message sub-stream owned by exactly one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub channel_type: ChannelType,
    /// Present iff `channel_type` is `Agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    pub message_count: u32,
    /// Preview of the most recent message, at most 100 characters.
    #[serde(default)]
    pub last_message: String,
    pub last_activity: DateTime<Utc>,
}

impl ChannelState {
    /// Create an empty channel of the given type.
    pub fn new(
        channel_id: impl Into<ChannelId>,
        channel_name: impl Into<String>,
        channel_type: ChannelType,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            channel_type,
            agent_role: None,
            message_count: 0,
            last_message: String::new(),
            last_activity: Utc::now(),
        }
    }

    /// Create an empty agent channel for the given role.
    pub fn agent(
        channel_id: impl Into<ChannelId>,
        channel_name: impl Into<String>,
        agent_role: impl Into<String>,
    ) -> Self {
        Self {
            agent_role: Some(agent_role.into()),
            ..Self::new(channel_id, channel_name, ChannelType::Agent)
        }
    }
}

/// A server: a grouping of channels, either regular or task-bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    pub server_id: ServerId,
    pub server_name: String,
    pub server_type: ServerType,
    /// Present iff `server_type` is `Task`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub channels: Vec<ChannelState>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Soft-delete marker; archived servers are never removed.
    #[serde(default)]
    pub archived: bool,
}

impl ServerState {
    /// Create a regular server with no channels.
    pub fn regular(server_id: impl Into<ServerId>, server_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            server_id: server_id.into(),
            server_name: server_name.into(),
            server_type: ServerType::Regular,
            task_id: None,
            channels: Vec::new(),
            created_at: now,
            last_activity: now,
            archived: false,
        }
    }

    /// Create a task server bound to `task_id` with no channels.
    pub fn task(
        server_id: impl Into<ServerId>,
        server_name: impl Into<String>,
        task_id: impl Into<TaskId>,
    ) -> Self {
        Self {
            server_type: ServerType::Task,
            task_id: Some(task_id.into()),
            ..Self::regular(server_id, server_name)
        }
    }

    /// Builder-style helper to seed channels before the server is added.
    pub fn with_channel(mut self, channel: ChannelState) -> Self {
        self.channels.push(channel);
        self
    }

    /// Look up an owned channel by id.
    pub fn channel(&self, channel_id: &ChannelId) -> Option<&ChannelState> {
        self.channels.iter().find(|c| &c.channel_id == channel_id)
    }

    /// Mutable lookup of an owned channel by id.
    pub fn channel_mut(&mut self, channel_id: &ChannelId) -> Option<&mut ChannelState> {
        self.channels.iter_mut().find(|c| &c.channel_id == channel_id)
    }
}

/// Lifecycle record of a task server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskServerState {
    pub task_id: TaskId,
    pub server_id: ServerId,
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default)]
    pub agent_channels: Vec<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A set of file references attached to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContextState {
    pub context_id: ContextId,
    pub file_paths: Vec<String>,
    pub context_summary: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_message_id: Option<MessageId>,
    #[serde(default)]
    pub sanitized: bool,
    #[serde(default)]
    pub threat_count: u32,
}

impl FileContextState {
    /// Create an unsanitized context; the store validates and marks it on add.
    pub fn new(
        context_id: impl Into<ContextId>,
        file_paths: Vec<String>,
        context_summary: impl Into<String>,
    ) -> Self {
        Self {
            context_id: context_id.into(),
            file_paths,
            context_summary: context_summary.into(),
            timestamp: Utc::now(),
            associated_message_id: None,
            sanitized: false,
            threat_count: 0,
        }
    }
}

/// One persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistoryState {
    pub message_id: MessageId,
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    pub content: String,
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sanitized: bool,
}

impl MessageHistoryState {
    /// Create an unsanitized message stamped with the current time.
    pub fn new(
        message_id: impl Into<MessageId>,
        server_id: impl Into<ServerId>,
        channel_id: impl Into<ChannelId>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            server_id: server_id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            role,
            provider_id: None,
            context_id: None,
            timestamp: Utc::now(),
            sanitized: false,
        }
    }
}

/// Notification behaviour for the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default)]
    pub muted_channels: BTreeSet<ChannelId>,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            muted_channels: BTreeSet::new(),
        }
    }
}

impl NotificationSettings {
    /// Settings with every notification turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sound: false,
            muted_channels: BTreeSet::new(),
        }
    }
}

/// Per-workspace user preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server_id: Option<ServerId>,
    #[serde(default)]
    pub collapsed_servers: BTreeSet<ServerId>,
    #[serde(default)]
    pub hidden_channels: BTreeSet<ChannelId>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

/// The root aggregate: all conversational and topology state of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: SessionId,
    /// Time of the last save.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub servers: Vec<ServerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_server_id: Option<ServerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub file_contexts: Vec<FileContextState>,
    #[serde(default)]
    pub message_history: Vec<MessageHistoryState>,
    #[serde(default)]
    pub task_server_states: Vec<TaskServerState>,
    #[serde(default)]
    pub user_preferences: SessionUserPreferences,
}

impl ChatSession {
    /// A fresh, empty session with a new id and default preferences.
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            timestamp: Utc::now(),
            servers: Vec::new(),
            active_server_id: None,
            active_channel_id: None,
            file_contexts: Vec::new(),
            message_history: Vec::new(),
            task_server_states: Vec::new(),
            user_preferences: SessionUserPreferences::default(),
        }
    }

    /// A minimal in-memory-only session used when restoration hits an
    /// unexpected error. Notifications are disabled.
    pub fn fallback() -> Self {
        let mut session = Self::new();
        session.user_preferences.notification_settings = NotificationSettings::disabled();
        session
    }

    pub fn server(&self, server_id: &ServerId) -> Option<&ServerState> {
        self.servers.iter().find(|s| &s.server_id == server_id)
    }

    pub fn server_mut(&mut self, server_id: &ServerId) -> Option<&mut ServerState> {
        self.servers.iter_mut().find(|s| &s.server_id == server_id)
    }

    pub fn task_server(&self, task_id: &TaskId) -> Option<&TaskServerState> {
        self.task_server_states.iter().find(|t| &t.task_id == task_id)
    }

    pub fn task_server_mut(&mut self, task_id: &TaskId) -> Option<&mut TaskServerState> {
        self.task_server_states
            .iter_mut()
            .find(|t| &t.task_id == task_id)
    }

    /// Messages of one channel, in insertion order.
    pub fn channel_history(
        &self,
        server_id: &ServerId,
        channel_id: &ChannelId,
    ) -> Vec<MessageHistoryState> {
        self.message_history
            .iter()
            .filter(|m| &m.server_id == server_id && &m.channel_id == channel_id)
            .cloned()
            .collect()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

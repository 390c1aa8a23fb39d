//! Session service: the mutation API over the single in-memory `ChatSession`.
//!
//! Every mutation validates first (leaving the session untouched on failure),
//! applies the change in memory, then performs a full re-persist through
//! `save_session`. The service takes `&mut self` everywhere; callers that
//! share it go through the `SessionStore` actor, which serializes access.

use std::sync::Arc;

use chrono::Utc;
use sessionvault_types::config::SessionConfig;
use sessionvault_types::error::{SessionError, StorageError, ValidationError};
use sessionvault_types::id::{ChannelId, ServerId, TaskId};
use sessionvault_types::security::SessionSecurityMetadata;
use sessionvault_types::session::{
    ChannelState, ChannelType, ChatSession, FileContextState, MessageHistoryState, ServerState,
    ServerType, SessionUserPreferences, TaskServerState, TaskStatus,
};
use tracing::{debug, info, warn};

use crate::hash::ContentHasher;
use crate::report::{ErrorReporter, TracingErrorReporter};
use crate::sanitize::{SanitizeScope, Sanitizer};
use crate::storage::secure_store::{SecureKeyValueStore, StoreKey};

use super::integrity::IntegrityValidator;
use super::restore::RestoreOutcome;
use super::validation::{validate_channel, validate_file_paths, validate_server};

/// Task type recorded for task servers added without an explicit one.
pub const DEFAULT_TASK_TYPE: &str = "general";

/// Point-in-time view of the service state, published after every command.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session: Option<Arc<ChatSession>>,
    pub security: Option<SessionSecurityMetadata>,
    pub outcome: Option<RestoreOutcome>,
}

/// Owns the active session and persists it through a secure store.
///
/// Generic over the store and hasher to keep the clean architecture boundary;
/// sanitizer and reporter are shared trait objects.
pub struct SessionService<K: SecureKeyValueStore, H: ContentHasher> {
    pub(super) store: K,
    pub(super) validator: IntegrityValidator<H>,
    sanitizer: Arc<dyn Sanitizer>,
    pub(super) reporter: Arc<dyn ErrorReporter>,
    config: SessionConfig,
    pub(super) session: Option<Arc<ChatSession>>,
    pub(super) security: Option<SessionSecurityMetadata>,
    pub(super) outcome: Option<RestoreOutcome>,
}

impl<K: SecureKeyValueStore, H: ContentHasher> SessionService<K, H> {
    /// Create a service with no active session. Call `initialize` next.
    pub fn new(store: K, hasher: H, sanitizer: Arc<dyn Sanitizer>, config: SessionConfig) -> Self {
        let config = config.normalized();
        Self {
            store,
            validator: IntegrityValidator::new(hasher, config.validation_interval()),
            sanitizer,
            reporter: Arc::new(TracingErrorReporter),
            config,
            session: None,
            security: None,
            outcome: None,
        }
    }

    /// Replace the default tracing reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Access the underlying store.
    pub fn store(&self) -> &K {
        &self.store
    }

    // --- Reads ---

    pub fn current_session(&self) -> Option<&Arc<ChatSession>> {
        self.session.as_ref()
    }

    pub fn security_metadata(&self) -> Option<&SessionSecurityMetadata> {
        self.security.as_ref()
    }

    pub fn restore_outcome(&self) -> Option<RestoreOutcome> {
        self.outcome
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            security: self.security.clone(),
            outcome: self.outcome,
        }
    }

    fn active(&self) -> Result<&ChatSession, SessionError> {
        self.session.as_deref().ok_or(SessionError::NotInitialized)
    }

    /// Copy-on-write access: published snapshots keep the previous version.
    fn active_mut(&mut self) -> Result<&mut ChatSession, SessionError> {
        self.session
            .as_mut()
            .map(Arc::make_mut)
            .ok_or(SessionError::NotInitialized)
    }

    // --- Topology ---

    /// Append a server. Task servers get a matching `TaskServerState` with
    /// the default task type.
    pub async fn add_server(&mut self, server: ServerState) -> Result<(), SessionError> {
        self.insert_server(server, DEFAULT_TASK_TYPE.to_string(), None)?;
        self.save_session().await
    }

    /// Append a task server with an explicit task type and phase.
    pub async fn add_task_server(
        &mut self,
        server: ServerState,
        task_type: String,
        phase: Option<String>,
    ) -> Result<(), SessionError> {
        if server.server_type != ServerType::Task {
            return Err(ValidationError::NotATaskServer(server.server_id.to_string()).into());
        }
        self.insert_server(server, task_type, phase)?;
        self.save_session().await
    }

    fn insert_server(
        &mut self,
        server: ServerState,
        task_type: String,
        phase: Option<String>,
    ) -> Result<(), SessionError> {
        validate_server(&server, self.active()?)?;

        let task_state = server
            .task_id
            .clone()
            .filter(|_| server.server_type == ServerType::Task)
            .map(|task_id| derive_task_state(&server, task_id, task_type, phase));

        let session = self.active_mut()?;
        info!(
            server_id = %server.server_id,
            server_type = %server.server_type,
            channels = server.channels.len(),
            "Server added"
        );
        session.servers.push(server);
        if let Some(task_state) = task_state {
            session.task_server_states.push(task_state);
        }
        Ok(())
    }

    /// Append a channel to an existing server.
    ///
    /// Fails with `NotFound` (session untouched) when the server is unknown.
    pub async fn add_channel(
        &mut self,
        server_id: &ServerId,
        channel: ChannelState,
    ) -> Result<(), SessionError> {
        let server = self
            .active()?
            .server(server_id)
            .ok_or_else(|| SessionError::not_found("server", server_id))?;
        validate_channel(&channel, server)?;

        let session = self.active_mut()?;
        let Some(server) = session.server_mut(server_id) else {
            return Err(SessionError::not_found("server", server_id));
        };
        server.last_activity = Utc::now();
        let task_id = server.task_id.clone().filter(|_| server.server_type == ServerType::Task);
        let channel_id = channel.channel_id.clone();
        let channel_type = channel.channel_type;
        server.channels.push(channel);

        if let Some(task) = task_id.and_then(|id| session.task_server_mut(&id)) {
            link_task_channel(task, &channel_id, channel_type);
        }
        debug!(%server_id, %channel_id, %channel_type, "Channel added");

        self.save_session().await
    }

    /// Soft-delete a task server: mark the task archived and its server
    /// `archived=true`.
    ///
    /// Unknown task ids and already-archived tasks are no-ops; the return
    /// value tells whether anything changed.
    pub async fn archive_task_server(&mut self, task_id: &TaskId) -> Result<bool, SessionError> {
        match self.active()?.task_server(task_id) {
            None => {
                debug!(%task_id, "Archive requested for unknown task; ignoring");
                return Ok(false);
            }
            Some(task) if task.status == TaskStatus::Archived => return Ok(false),
            Some(_) => {}
        }

        let session = self.active_mut()?;
        let now = Utc::now();
        let mut server_id = None;
        if let Some(task) = session.task_server_mut(task_id) {
            task.status = TaskStatus::Archived;
            task.completed_at = Some(now);
            server_id = Some(task.server_id.clone());
        }
        if let Some(server) = server_id.as_ref().and_then(|id| session.server_mut(id)) {
            server.archived = true;
        }
        info!(%task_id, "Task server archived");

        self.save_session().await?;
        Ok(true)
    }

    /// Mark an active task completed. Non-active or unknown tasks are no-ops.
    pub async fn complete_task_server(&mut self, task_id: &TaskId) -> Result<bool, SessionError> {
        let is_active = self
            .active()?
            .task_server(task_id)
            .is_some_and(|t| t.status == TaskStatus::Active);
        if !is_active {
            return Ok(false);
        }

        if let Some(task) = self.active_mut()?.task_server_mut(task_id) {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
        }
        info!(%task_id, "Task server completed");

        self.save_session().await?;
        Ok(true)
    }

    /// Record the current phase of a task. Unknown tasks are no-ops.
    pub async fn update_task_phase(
        &mut self,
        task_id: &TaskId,
        phase: Option<String>,
    ) -> Result<bool, SessionError> {
        if self.active()?.task_server(task_id).is_none() {
            return Ok(false);
        }
        if let Some(task) = self.active_mut()?.task_server_mut(task_id) {
            debug!(%task_id, phase = phase.as_deref().unwrap_or("-"), "Task phase updated");
            task.phase = phase;
        }
        self.save_session().await?;
        Ok(true)
    }

    /// Point the workspace at a server and optionally one of its channels.
    pub async fn set_active_channel(
        &mut self,
        server_id: &ServerId,
        channel_id: Option<ChannelId>,
    ) -> Result<(), SessionError> {
        let server = self
            .active()?
            .server(server_id)
            .ok_or_else(|| SessionError::not_found("server", server_id))?;
        if let Some(channel_id) = &channel_id {
            if server.channel(channel_id).is_none() {
                return Err(SessionError::not_found("channel", channel_id));
            }
        }

        let session = self.active_mut()?;
        session.active_server_id = Some(server_id.clone());
        session.active_channel_id = channel_id;
        self.save_session().await
    }

    pub async fn update_preferences(
        &mut self,
        preferences: SessionUserPreferences,
    ) -> Result<(), SessionError> {
        self.active_mut()?.user_preferences = preferences;
        self.save_session().await
    }

    // --- Content ---

    /// Sanitize and append a message, evicting the oldest beyond the cap, and
    /// update the owning channel's counters and preview.
    pub async fn add_message(
        &mut self,
        mut message: MessageHistoryState,
    ) -> Result<MessageHistoryState, SessionError> {
        self.active()?;

        let (text, threats, sanitized) = sanitize_text(
            self.sanitizer.as_ref(),
            self.reporter.as_ref(),
            &message.content,
            SanitizeScope::Message,
        );
        if threats > 0 {
            warn!(message_id = %message.message_id, threats, "Removed unsafe content from message");
        }
        message.content = text;
        message.sanitized = sanitized;

        let max = self.config.max_message_history;
        let preview_chars = self.config.last_message_preview_chars;
        let session = self.active_mut()?;

        match session
            .server_mut(&message.server_id)
            .and_then(|s| s.channel_mut(&message.channel_id))
        {
            Some(channel) => {
                channel.message_count += 1;
                channel.last_message = preview(&message.content, preview_chars);
                channel.last_activity = Utc::now();
            }
            None => debug!(
                server_id = %message.server_id,
                channel_id = %message.channel_id,
                "Message references an unknown channel; storing without channel update"
            ),
        }

        session.message_history.push(message.clone());
        evict_oldest(&mut session.message_history, max);

        self.save_session().await?;
        Ok(message)
    }

    /// Validate paths (hard failure), sanitize the summary, and append the
    /// context, evicting the oldest beyond the cap.
    pub async fn add_file_context(
        &mut self,
        mut context: FileContextState,
    ) -> Result<FileContextState, SessionError> {
        self.active()?;
        validate_file_paths(&context.file_paths)?;

        let (summary, threats, sanitized) = sanitize_text(
            self.sanitizer.as_ref(),
            self.reporter.as_ref(),
            &context.context_summary,
            SanitizeScope::Message,
        );
        context.context_summary = summary;
        context.threat_count = threats;
        context.sanitized = sanitized;

        let max = self.config.max_file_contexts;
        let session = self.active_mut()?;
        session.file_contexts.push(context.clone());
        evict_oldest(&mut session.file_contexts, max);
        debug!(context_id = %context.context_id, paths = context.file_paths.len(), "File context added");

        self.save_session().await?;
        Ok(context)
    }

    // --- Persistence ---

    /// Sanitize, re-stamp, and write the session and fresh security metadata.
    ///
    /// Failures are reported and then returned; the in-memory state keeps
    /// whatever change preceded the save.
    pub async fn save_session(&mut self) -> Result<(), SessionError> {
        let result = self.persist().await;
        if let Err(err) = &result {
            self.reporter.report(err);
        }
        result
    }

    /// Keep-alive save: re-persist when a session is active.
    pub async fn refresh(&mut self) -> Result<bool, SessionError> {
        if self.session.is_none() {
            return Ok(false);
        }
        self.save_session().await?;
        Ok(true)
    }

    /// Delete both keys and drop the in-memory session.
    ///
    /// In-memory state is reset even if a delete fails; the first failure is
    /// returned.
    pub async fn clear_session(&mut self) -> Result<(), SessionError> {
        let session_result = self.store.delete(StoreKey::Session).await;
        let security_result = self.store.delete(StoreKey::Security).await;

        if let Some(session) = &self.session {
            info!(session_id = %session.session_id, "Session cleared");
        }
        self.session = None;
        self.security = None;
        self.outcome = None;

        session_result.and(security_result).map_err(|e| {
            let err = SessionError::from(e);
            self.reporter.report(&err);
            err
        })
    }

    /// Unreported save used by both `save_session` and the restore path.
    pub(super) async fn persist(&mut self) -> Result<(), SessionError> {
        let now = Utc::now();
        let (payload, metadata) = {
            let session = self
                .session
                .as_mut()
                .map(Arc::make_mut)
                .ok_or(SessionError::NotInitialized)?;
            sanitize_payload(self.sanitizer.as_ref(), self.reporter.as_ref(), session);
            session.timestamp = now;
            let payload = serde_json::to_string(&*session)
                .map_err(|e| StorageError::Encode(e.to_string()))?;
            let metadata = self.validator.refresh(session, self.security.as_ref(), now);
            (payload, metadata)
        };
        let security_payload =
            serde_json::to_string(&metadata).map_err(|e| StorageError::Encode(e.to_string()))?;

        self.store.store(StoreKey::Session, &payload).await?;
        self.store.store(StoreKey::Security, &security_payload).await?;

        debug!(
            access_count = metadata.access_count,
            bytes = payload.len(),
            "Session persisted"
        );
        self.security = Some(metadata);
        Ok(())
    }
}

/// Derive the lifecycle record for a task server being added.
fn derive_task_state(
    server: &ServerState,
    task_id: TaskId,
    task_type: String,
    phase: Option<String>,
) -> TaskServerState {
    let first_of = |kind: ChannelType| {
        server
            .channels
            .iter()
            .find(|c| c.channel_type == kind)
            .map(|c| c.channel_id.clone())
    };
    TaskServerState {
        task_id,
        server_id: server.server_id.clone(),
        task_type,
        phase,
        agent_channels: server
            .channels
            .iter()
            .filter(|c| c.channel_type == ChannelType::Agent)
            .map(|c| c.channel_id.clone())
            .collect(),
        progress_channel_id: first_of(ChannelType::Progress),
        planning_channel_id: first_of(ChannelType::Planning),
        status: TaskStatus::Active,
        created_at: Utc::now(),
        completed_at: None,
    }
}

/// Record a channel newly added to a task server on its lifecycle record.
fn link_task_channel(task: &mut TaskServerState, channel_id: &ChannelId, kind: ChannelType) {
    match kind {
        ChannelType::Agent if !task.agent_channels.contains(channel_id) => {
            task.agent_channels.push(channel_id.clone());
        }
        ChannelType::Progress if task.progress_channel_id.is_none() => {
            task.progress_channel_id = Some(channel_id.clone());
        }
        ChannelType::Planning if task.planning_channel_id.is_none() => {
            task.planning_channel_id = Some(channel_id.clone());
        }
        _ => {}
    }
}

/// Run text through the sanitizer. A sanitizer failure is reported and the
/// original text kept, flagged as unsanitized.
fn sanitize_text(
    sanitizer: &dyn Sanitizer,
    reporter: &dyn ErrorReporter,
    text: &str,
    scope: SanitizeScope,
) -> (String, u32, bool) {
    match sanitizer.sanitize(text, scope) {
        Ok(clean) => (clean.text, clean.threats_found, true),
        Err(err) => {
            reporter.report(&SessionError::Sanitization(err.to_string()));
            (text.to_string(), 0, false)
        }
    }
}

/// Sanitize every display name and message body in the payload.
fn sanitize_payload(sanitizer: &dyn Sanitizer, reporter: &dyn ErrorReporter, session: &mut ChatSession) {
    for server in &mut session.servers {
        let (name, _, _) =
            sanitize_text(sanitizer, reporter, &server.server_name, SanitizeScope::UserInput);
        server.server_name = name;
        for channel in &mut server.channels {
            let (name, _, _) =
                sanitize_text(sanitizer, reporter, &channel.channel_name, SanitizeScope::UserInput);
            channel.channel_name = name;
        }
    }
    for message in &mut session.message_history {
        let (content, _, ok) =
            sanitize_text(sanitizer, reporter, &message.content, SanitizeScope::Message);
        message.content = content;
        message.sanitized |= ok;
    }
}

fn preview(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

fn evict_oldest<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

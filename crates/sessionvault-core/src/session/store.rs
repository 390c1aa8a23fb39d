//! `SessionStore`: cloneable handle to the task that owns the session.
//!
//! All mutations are sent over an mpsc channel to a single actor task that
//! owns the [`SessionService`], so concurrent callers are applied one at a
//! time and no update is lost. After every command the actor publishes a
//! [`SessionSnapshot`] on a watch channel before replying, which lets the
//! synchronous getters read a consistent view without awaiting the actor.

use std::sync::Arc;

use sessionvault_types::error::SessionError;
use sessionvault_types::id::{ChannelId, ServerId, TaskId};
use sessionvault_types::security::SessionSecurityMetadata;
use sessionvault_types::session::{
    ChannelState, ChatSession, FileContextState, MessageHistoryState, ServerState,
    SessionUserPreferences, TaskServerState,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use crate::hash::ContentHasher;
use crate::storage::secure_store::SecureKeyValueStore;

use super::restore::RestoreOutcome;
use super::service::{SessionService, SessionSnapshot};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Initialize(oneshot::Sender<Arc<ChatSession>>),
    AddServer {
        server: ServerState,
        task: Option<(String, Option<String>)>,
        reply: Reply<()>,
    },
    AddChannel {
        server_id: ServerId,
        channel: ChannelState,
        reply: Reply<()>,
    },
    ArchiveTaskServer {
        task_id: TaskId,
        reply: Reply<bool>,
    },
    CompleteTaskServer {
        task_id: TaskId,
        reply: Reply<bool>,
    },
    UpdateTaskPhase {
        task_id: TaskId,
        phase: Option<String>,
        reply: Reply<bool>,
    },
    AddMessage {
        message: MessageHistoryState,
        reply: Reply<MessageHistoryState>,
    },
    AddFileContext {
        context: FileContextState,
        reply: Reply<FileContextState>,
    },
    SetActiveChannel {
        server_id: ServerId,
        channel_id: Option<ChannelId>,
        reply: Reply<()>,
    },
    UpdatePreferences {
        preferences: SessionUserPreferences,
        reply: Reply<()>,
    },
    Save(Reply<()>),
    Refresh(Reply<bool>),
    Clear(Reply<()>),
}

/// Handle to the session actor. Cheap to clone; every clone talks to the
/// same session.
#[derive(Clone)]
pub struct SessionStore {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionStore {
    /// Move `service` into a new actor task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<K, H>(service: SessionService<K, H>, buffer: usize) -> Self
    where
        K: SecureKeyValueStore + 'static,
        H: ContentHasher + 'static,
    {
        let (commands, inbox) = mpsc::channel(buffer.max(1));
        let (publisher, snapshots) = watch::channel(service.snapshot());
        tokio::spawn(run_actor(service, inbox, publisher));
        Self {
            commands,
            snapshots,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::ActorClosed)?;
        response.await.map_err(|_| SessionError::ActorClosed)?
    }

    /// Restore or create the session. Never fails: if the actor is gone an
    /// in-memory fallback session is returned.
    pub async fn initialize(&self) -> Arc<ChatSession> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Initialize(reply)).await.is_ok() {
            if let Ok(session) = response.await {
                return session;
            }
        }
        error!("Session actor unavailable; using in-memory fallback session");
        Arc::new(ChatSession::fallback())
    }

    pub async fn add_server(&self, server: ServerState) -> Result<(), SessionError> {
        self.request(|reply| Command::AddServer {
            server,
            task: None,
            reply,
        })
        .await
    }

    pub async fn add_task_server(
        &self,
        server: ServerState,
        task_type: impl Into<String>,
        phase: Option<String>,
    ) -> Result<(), SessionError> {
        let task = Some((task_type.into(), phase));
        self.request(|reply| Command::AddServer {
            server,
            task,
            reply,
        })
        .await
    }

    pub async fn add_channel(
        &self,
        server_id: ServerId,
        channel: ChannelState,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::AddChannel {
            server_id,
            channel,
            reply,
        })
        .await
    }

    /// Soft-delete a task server. Returns false when nothing changed.
    pub async fn archive_task_server(&self, task_id: TaskId) -> Result<bool, SessionError> {
        self.request(|reply| Command::ArchiveTaskServer { task_id, reply })
            .await
    }

    pub async fn complete_task_server(&self, task_id: TaskId) -> Result<bool, SessionError> {
        self.request(|reply| Command::CompleteTaskServer { task_id, reply })
            .await
    }

    pub async fn update_task_phase(
        &self,
        task_id: TaskId,
        phase: Option<String>,
    ) -> Result<bool, SessionError> {
        self.request(|reply| Command::UpdateTaskPhase {
            task_id,
            phase,
            reply,
        })
        .await
    }

    /// Add a message; returns the stored (sanitized) copy.
    pub async fn add_message(
        &self,
        message: MessageHistoryState,
    ) -> Result<MessageHistoryState, SessionError> {
        self.request(|reply| Command::AddMessage { message, reply })
            .await
    }

    /// Add a file context; returns the stored (sanitized) copy.
    pub async fn add_file_context(
        &self,
        context: FileContextState,
    ) -> Result<FileContextState, SessionError> {
        self.request(|reply| Command::AddFileContext { context, reply })
            .await
    }

    pub async fn set_active_channel(
        &self,
        server_id: ServerId,
        channel_id: Option<ChannelId>,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::SetActiveChannel {
            server_id,
            channel_id,
            reply,
        })
        .await
    }

    pub async fn update_preferences(
        &self,
        preferences: SessionUserPreferences,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::UpdatePreferences { preferences, reply })
            .await
    }

    pub async fn save_session(&self) -> Result<(), SessionError> {
        self.request(Command::Save).await
    }

    /// Keep-alive save. Returns false when there is no active session.
    pub async fn refresh(&self) -> Result<bool, SessionError> {
        self.request(Command::Refresh).await
    }

    pub async fn clear_session(&self) -> Result<(), SessionError> {
        self.request(Command::Clear).await
    }

    // --- Synchronous reads from the latest snapshot ---

    pub fn current_session(&self) -> Option<Arc<ChatSession>> {
        self.snapshots.borrow().session.clone()
    }

    pub fn security_metadata(&self) -> Option<SessionSecurityMetadata> {
        self.snapshots.borrow().security.clone()
    }

    pub fn restore_outcome(&self) -> Option<RestoreOutcome> {
        self.snapshots.borrow().outcome
    }

    /// Messages of one channel, in insertion order. Empty without a session.
    pub fn channel_history(
        &self,
        server_id: &ServerId,
        channel_id: &ChannelId,
    ) -> Vec<MessageHistoryState> {
        self.current_session()
            .map(|s| s.channel_history(server_id, channel_id))
            .unwrap_or_default()
    }

    /// A server by id, archived or not.
    pub fn server(&self, server_id: &ServerId) -> Option<ServerState> {
        self.current_session()
            .and_then(|s| s.server(server_id).cloned())
    }

    /// Every task-server record, in creation order.
    pub fn task_server_states(&self) -> Vec<TaskServerState> {
        self.current_session()
            .map(|s| s.task_server_states.clone())
            .unwrap_or_default()
    }

    pub fn task_server_state(&self, task_id: &TaskId) -> Option<TaskServerState> {
        self.current_session()
            .and_then(|s| s.task_server(task_id).cloned())
    }

    /// Receiver that is notified after every applied command.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

async fn run_actor<K, H>(
    mut service: SessionService<K, H>,
    mut inbox: mpsc::Receiver<Command>,
    publisher: watch::Sender<SessionSnapshot>,
) where
    K: SecureKeyValueStore,
    H: ContentHasher,
{
    while let Some(command) = inbox.recv().await {
        match command {
            Command::Initialize(reply) => {
                let session = service.initialize().await;
                publisher.send_replace(service.snapshot());
                let _ = reply.send(session);
            }
            Command::AddServer {
                server,
                task,
                reply,
            } => {
                let result = match task {
                    Some((task_type, phase)) => {
                        service.add_task_server(server, task_type, phase).await
                    }
                    None => service.add_server(server).await,
                };
                finish(&service, &publisher, reply, result);
            }
            Command::AddChannel {
                server_id,
                channel,
                reply,
            } => {
                let result = service.add_channel(&server_id, channel).await;
                finish(&service, &publisher, reply, result);
            }
            Command::ArchiveTaskServer { task_id, reply } => {
                let result = service.archive_task_server(&task_id).await;
                finish(&service, &publisher, reply, result);
            }
            Command::CompleteTaskServer { task_id, reply } => {
                let result = service.complete_task_server(&task_id).await;
                finish(&service, &publisher, reply, result);
            }
            Command::UpdateTaskPhase {
                task_id,
                phase,
                reply,
            } => {
                let result = service.update_task_phase(&task_id, phase).await;
                finish(&service, &publisher, reply, result);
            }
            Command::AddMessage { message, reply } => {
                let result = service.add_message(message).await;
                finish(&service, &publisher, reply, result);
            }
            Command::AddFileContext { context, reply } => {
                let result = service.add_file_context(context).await;
                finish(&service, &publisher, reply, result);
            }
            Command::SetActiveChannel {
                server_id,
                channel_id,
                reply,
            } => {
                let result = service.set_active_channel(&server_id, channel_id).await;
                finish(&service, &publisher, reply, result);
            }
            Command::UpdatePreferences { preferences, reply } => {
                let result = service.update_preferences(preferences).await;
                finish(&service, &publisher, reply, result);
            }
            Command::Save(reply) => {
                let result = service.save_session().await;
                finish(&service, &publisher, reply, result);
            }
            Command::Refresh(reply) => {
                let result = service.refresh().await;
                finish(&service, &publisher, reply, result);
            }
            Command::Clear(reply) => {
                let result = service.clear_session().await;
                finish(&service, &publisher, reply, result);
            }
        }
    }
    debug!("Session actor stopped; all handles dropped");
}

/// Publish the post-command snapshot, then answer the caller.
fn finish<K, H, T>(
    service: &SessionService<K, H>,
    publisher: &watch::Sender<SessionSnapshot>,
    reply: Reply<T>,
    result: Result<T, SessionError>,
) where
    K: SecureKeyValueStore,
    H: ContentHasher,
{
    publisher.send_replace(service.snapshot());
    // The caller may have stopped waiting; the command is applied regardless.
    let _ = reply.send(result);
}

#[cfg(test)]
mod tests {
    use sessionvault_types::session::{ChannelType, MessageRole};

    use super::*;
    use crate::session::testing::{ScriptStripper, service_with};
    use crate::storage::memory::MemoryKeyValueStore;
    use crate::storage::secure_store::StoreKey;

    async fn started() -> (SessionStore, Arc<MemoryKeyValueStore>) {
        let backing = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::spawn(service_with(backing.clone(), Arc::new(ScriptStripper)), 16);
        store.initialize().await;
        (store, backing)
    }

    #[tokio::test]
    async fn test_reads_are_empty_before_initialize() {
        let backing = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::spawn(service_with(backing, Arc::new(ScriptStripper)), 4);
        assert!(store.current_session().is_none());
        assert!(store.security_metadata().is_none());
        assert!(store
            .channel_history(&ServerId::from("srv"), &ChannelId::from("ch"))
            .is_empty());
        assert!(store.server(&ServerId::from("srv")).is_none());
        assert!(store.task_server_states().is_empty());
        assert!(matches!(
            store.save_session().await,
            Err(SessionError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_server_and_task_reads() {
        let (store, _backing) = started().await;
        assert!(store.task_server_states().is_empty());

        store
            .add_server(ServerState::regular("srv", "Main"))
            .await
            .unwrap();
        store
            .add_task_server(ServerState::task("srv-t", "Build", "task-1"), "build", None)
            .await
            .unwrap();

        let server = store.server(&ServerId::from("srv")).unwrap();
        assert_eq!(server.server_name, "Main");
        assert!(store.server(&ServerId::from("missing")).is_none());

        let tasks = store.task_server_states();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, TaskId::from("task-1"));
        assert_eq!(tasks[0].task_type, "build");
    }

    #[tokio::test]
    async fn test_initialize_twice_returns_same_arc() {
        let (store, _backing) = started().await;
        let first = store.current_session().unwrap();
        let second = store.initialize().await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_completed_mutation() {
        let (store, _backing) = started().await;
        store
            .add_server(
                ServerState::regular("srv", "Main")
                    .with_channel(ChannelState::new("ch", "general", ChannelType::General)),
            )
            .await
            .unwrap();
        store
            .add_message(MessageHistoryState::new(
                "m1",
                "srv",
                "ch",
                MessageRole::Assistant,
                "done",
            ))
            .await
            .unwrap();

        let history = store.channel_history(&ServerId::from("srv"), &ChannelId::from("ch"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "done");
        assert_eq!(store.security_metadata().unwrap().access_count, 3);
    }

    #[tokio::test]
    async fn test_concurrent_messages_are_not_lost() {
        let (store, backing) = started().await;
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .add_message(MessageHistoryState::new(
                            format!("m{i}"),
                            "srv",
                            "ch",
                            MessageRole::User,
                            format!("message {i}"),
                        ))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let session = store.current_session().unwrap();
        assert_eq!(session.message_history.len(), 50);
        let persisted: ChatSession =
            serde_json::from_str(&backing.raw(StoreKey::Session).unwrap()).unwrap();
        assert_eq!(persisted.message_history.len(), 50);
    }

    #[tokio::test]
    async fn test_task_lifecycle_through_handle() {
        let (store, _backing) = started().await;
        store
            .add_task_server(ServerState::task("srv-t", "Build", "task-1"), "build", None)
            .await
            .unwrap();
        let task_id = TaskId::from("task-1");
        assert!(store.archive_task_server(task_id.clone()).await.unwrap());
        assert!(!store.archive_task_server(task_id.clone()).await.unwrap());
        let task = store.task_server_state(&task_id).unwrap();
        assert_eq!(task.task_type, "build");
        assert_eq!(
            task.status,
            sessionvault_types::session::TaskStatus::Archived
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let (store, _backing) = started().await;
        let mut updates = store.subscribe();
        updates.borrow_and_update();
        store
            .add_server(ServerState::regular("srv", "Main"))
            .await
            .unwrap();
        assert!(updates.has_changed().unwrap());
        let servers = updates
            .borrow_and_update()
            .session
            .as_ref()
            .map(|s| s.servers.len());
        assert_eq!(servers, Some(1));
    }

    #[tokio::test]
    async fn test_clear_resets_snapshot() {
        let (store, backing) = started().await;
        store.clear_session().await.unwrap();
        assert!(store.current_session().is_none());
        assert!(backing.raw(StoreKey::Session).is_none());
        assert!(!store.refresh().await.unwrap());
    }
}

use thiserror::Error;

/// Malformed server, channel, or file-context input.
///
/// Raised before any state is touched; the session is left unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task server '{0}' requires a task id")]
    MissingTaskId(String),

    #[error("regular server '{0}' must not carry a task id")]
    UnexpectedTaskId(String),

    #[error("server '{0}' is not a task server")]
    NotATaskServer(String),

    #[error("agent channel '{0}' requires an agent role")]
    MissingAgentRole(String),

    #[error("non-agent channel '{0}' must not carry an agent role")]
    UnexpectedAgentRole(String),

    #[error("server '{0}' already exists")]
    DuplicateServer(String),

    #[error("task '{0}' already has a task server")]
    DuplicateTask(String),

    #[error("channel '{0}' already exists in this server")]
    DuplicateChannel(String),

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("file context must reference at least one path")]
    EmptyPaths,

    #[error("path '{0}' contains parent-directory traversal")]
    PathTraversal(String),

    #[error("path '{0}' contains markup characters")]
    PathMarkup(String),
}

/// Failure of the secure key-value store or of the payload codec.
///
/// Never carries payload content or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("payload could not be decoded: {0}")]
    Decode(String),

    #[error("payload could not be encoded: {0}")]
    Encode(String),
}

/// Errors surfaced by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("no active session; call initialize() first")]
    NotInitialized,

    #[error("integrity hash mismatch: expected '{expected}', got '{actual}'")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("security metadata is stale ({age_secs}s since last validation)")]
    SecurityStale { age_secs: i64 },

    #[error("sanitizer failed: {0}")]
    Sanitization(String),

    #[error("session actor is no longer running")]
    ActorClosed,
}

impl SessionError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        SessionError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

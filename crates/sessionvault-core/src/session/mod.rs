//! Session persistence: the in-memory workspace session, its restore gate,
//! and the serialized store handle.
//!
//! - `integrity`: structural digest and security-metadata freshness
//! - `validation`: strict checks on servers, channels, and file paths
//! - `service`: the mutation API over one `ChatSession`
//! - `restore`: the restore-vs-create state machine run by `initialize`
//! - `store`: the actor that serializes all mutations and publishes snapshots
//! - `scheduler`: periodic keep-alive re-save

pub mod integrity;
pub mod restore;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod validation;

pub use restore::{CreateReason, RestoreOutcome};
pub use scheduler::ValidationScheduler;
pub use service::SessionService;
pub use store::SessionStore;

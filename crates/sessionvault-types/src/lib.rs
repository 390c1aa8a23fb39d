//! Shared domain types for SessionVault.
//!
//! This crate contains the persisted data model of a chat workspace session
//! (servers, channels, task servers, message history, file contexts), the
//! sibling security metadata, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod id;
pub mod security;
pub mod session;

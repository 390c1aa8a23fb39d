//! Storage abstractions for SessionVault.
//!
//! Defines the secure key-value store port plus an in-memory implementation
//! used by tests and ephemeral runs. Durable implementations live in
//! sessionvault-infra.

pub mod memory;
pub mod secure_store;

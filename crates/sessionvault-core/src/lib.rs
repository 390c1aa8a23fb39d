//! Session store, integrity gate, and port trait definitions for SessionVault.
//!
//! This crate defines the "ports" (store, sanitizer, hasher, error reporter
//! traits) that the infrastructure layer implements. It depends only on
//! `sessionvault-types` -- never on `sessionvault-infra` or any database/IO crate.

pub mod hash;
pub mod report;
pub mod sanitize;
pub mod session;
pub mod storage;

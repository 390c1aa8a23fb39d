//! SQLite storage layer.
//!
//! WAL-mode database with split read/write pools holding encrypted blobs.

pub mod blob;
pub mod pool;

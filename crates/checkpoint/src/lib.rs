//! Replication position persistence.
//!
//! A pipeline checkpoints the last replication position whose effects are
//! fully applied downstream. The position is an opaque string (a GTID set
//! for MySQL sources); this crate neither parses nor orders it, it only
//! stores and restores it durably.
//!
//! # Architecture
//!
//! - [`PositionStore`]: version-agnostic storage backend trait
//! - [`FilesystemStore`]: JSON file per pipeline, atomically replaced
//! - [`MemoryStore`]: in-process store for tests
//! - [`PositionTracker`]: shared in-memory position plus periodic flushing

mod filesystem;
mod memory;
mod store;
mod tracker;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use store::{PositionStore, StoredPosition};
pub use tracker::PositionTracker;

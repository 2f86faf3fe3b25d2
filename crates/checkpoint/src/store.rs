//! Position storage trait and stored record shape.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position record stored in a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPosition {
    /// Pipeline name the position belongs to.
    pub name: String,
    /// Opaque replication position, e.g. a GTID set.
    pub position: String,
    /// Timestamp of the last save.
    pub updated_at: DateTime<Utc>,
}

/// Trait for position storage operations.
///
/// Implementations must make `save` durable before returning: a position
/// that was reported saved may be used as the restart point after a crash.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persist the position for the named pipeline, replacing any previous
    /// record.
    async fn save(&self, name: &str, position: &str) -> Result<()>;

    /// Read the stored position for the named pipeline.
    ///
    /// Returns None if no position has ever been saved.
    async fn load(&self, name: &str) -> Result<Option<StoredPosition>>;
}

//! In-memory position storage, for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::store::{PositionStore, StoredPosition};

#[derive(Default)]
pub struct MemoryStore {
    positions: Mutex<HashMap<String, StoredPosition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn save(&self, name: &str, position: &str) -> Result<()> {
        let mut positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        positions.insert(
            name.to_string(),
            StoredPosition {
                name: name.to_string(),
                position: position.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<StoredPosition>> {
        let positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(positions.get(name).cloned())
    }
}

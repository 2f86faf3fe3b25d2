//! Shared position tracking with periodic durable saves.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::store::PositionStore;

/// Latest applied replication position, shared between the sink (which
/// advances it) and the save loop (which persists it).
///
/// The tracker advances monotonically in the sense the pipeline defines:
/// the sink only calls [`update`](PositionTracker::update) after every
/// message up to that position has been flushed downstream.
pub struct PositionTracker {
    store: Arc<dyn PositionStore>,
    name: String,
    current: Mutex<String>,
}

impl PositionTracker {
    pub fn new(store: Arc<dyn PositionStore>, name: impl Into<String>, initial: String) -> Self {
        Self {
            store,
            name: name.into(),
            current: Mutex::new(initial),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a newly applied position. An empty position is ignored; it
    /// would otherwise erase the restart point.
    pub fn update(&self, position: &str) {
        if position.is_empty() {
            tracing::warn!(name = %self.name, "ignoring empty position update");
            return;
        }
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = position.to_string();
    }

    pub fn current(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Persist the current position. A failure here is a checkpointing
    /// failure the pipeline must not survive silently.
    pub async fn save(&self) -> Result<()> {
        let position = self.current();
        if position.is_empty() {
            return Ok(());
        }
        self.store
            .save(&self.name, &position)
            .await
            .with_context(|| format!("saving position for pipeline {}", self.name))
    }

    /// Save the position every `interval` until cancelled. Returns only on
    /// a save failure.
    pub async fn run_periodic_save(&self, interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.save().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_update_and_save() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PositionTracker::new(store.clone(), "p", String::new());

        tracker.update("uuid:1-3");
        tracker.update("uuid:1-7");
        tracker.save().await.unwrap();

        let stored = store.load("p").await.unwrap().unwrap();
        assert_eq!(stored.position, "uuid:1-7");
    }

    #[tokio::test]
    async fn test_empty_updates_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PositionTracker::new(store.clone(), "p", "uuid:1-3".to_string());

        tracker.update("");
        assert_eq!(tracker.current(), "uuid:1-3");
    }

    #[tokio::test]
    async fn test_save_skips_when_nothing_tracked() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PositionTracker::new(store.clone(), "p", String::new());

        tracker.save().await.unwrap();
        assert!(store.load("p").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_save_flushes_updates() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(PositionTracker::new(
            store.clone(),
            "p",
            "uuid:1-1".to_string(),
        ));

        let loop_tracker = tracker.clone();
        let handle =
            tokio::spawn(
                async move { loop_tracker.run_periodic_save(Duration::from_secs(3)).await },
            );

        tracker.update("uuid:1-9");
        tokio::time::sleep(Duration::from_secs(4)).await;
        handle.abort();

        let stored = store.load("p").await.unwrap().unwrap();
        assert_eq!(stored.position, "uuid:1-9");
    }
}

//! Filesystem-based position storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;

use crate::store::{PositionStore, StoredPosition};

/// Filesystem implementation of PositionStore.
///
/// Stores one JSON file per pipeline under a directory. Saves write to a
/// temporary file and rename it over the target, so a crash mid-write
/// leaves the previous record intact.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("position_{name}.json"))
    }
}

#[async_trait]
impl PositionStore for FilesystemStore {
    async fn save(&self, name: &str, position: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating position directory {}", self.dir.display()))?;

        let stored = StoredPosition {
            name: name.to_string(),
            position: position.to_string(),
            updated_at: Utc::now(),
        };

        let target = self.path_for(name);
        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&stored)?)
            .with_context(|| format!("writing position file {}", tmp.display()))?;
        std::fs::rename(&tmp, &target)
            .with_context(|| format!("replacing position file {}", target.display()))?;

        tracing::debug!(position, file = %target.display(), "saved position");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<StoredPosition>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading position file {}", path.display()))?;
        let stored = serde_json::from_str(&content)
            .with_context(|| format!("decoding position file {}", path.display()))?;
        Ok(Some(stored))
    }
}

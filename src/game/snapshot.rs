//! Saving and loading whole games as JSON
//!
//! A snapshot is the complete [`GameState`]: zones, entities, the RNG, the
//! pending decision and the continuation stack. Loading a snapshot and
//! continuing play behaves exactly like never having stopped.

use crate::game::state::GameState;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    pub state: GameState,
}

impl GameSnapshot {
    pub fn new(state: GameState) -> Self {
        GameSnapshot { version: SNAPSHOT_VERSION, state }
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: GameSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Save this snapshot to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Load a snapshot from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}

/// Errors that can occur during snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported snapshot version {0} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion(u32),
}

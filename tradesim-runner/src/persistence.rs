//! Circuit-breaker snapshot persistence for crash recovery.
//!
//! Failures are reported as [`PersistenceError`] and never stop a session:
//! the shadow driver logs them and keeps its in-memory state.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use tradesim_core::risk::CircuitBreakerState;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where breaker snapshots live between process runs.
pub trait BreakerStore: Send {
    /// Last saved snapshot, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<CircuitBreakerState>, PersistenceError>;

    fn save(&mut self, state: &CircuitBreakerState) -> Result<(), PersistenceError>;
}

/// Discards snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl BreakerStore for NullStore {
    fn load(&self) -> Result<Option<CircuitBreakerState>, PersistenceError> {
        Ok(None)
    }

    fn save(&mut self, _state: &CircuitBreakerState) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Keeps the latest snapshot in memory and counts saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Option<CircuitBreakerState>,
    saves: usize,
}

impl MemoryStore {
    pub fn new(initial: Option<CircuitBreakerState>) -> Self {
        Self {
            state: initial,
            saves: 0,
        }
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn latest(&self) -> Option<&CircuitBreakerState> {
        self.state.as_ref()
    }
}

impl BreakerStore for MemoryStore {
    fn load(&self) -> Result<Option<CircuitBreakerState>, PersistenceError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &CircuitBreakerState) -> Result<(), PersistenceError> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}

/// One pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl BreakerStore for JsonFileStore {
    fn load(&self) -> Result<Option<CircuitBreakerState>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&mut self, state: &CircuitBreakerState) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

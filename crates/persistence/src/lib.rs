#![deny(warnings)]

//! Persistence layer: the save/load collaborator.
//!
//! The game keeps exactly one snapshot document; `save` replaces it and
//! `load` returns the most recent one, or `None` for a fresh game. Store
//! failures are reported to callers and must never corrupt the in-memory
//! aggregate, so the engine treats them as warnings, not faults.

use game_core::GameState;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by snapshot stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Snapshot store contract consumed by the turn engine.
pub trait SaveStore {
    /// Replace the stored snapshot with `state`.
    fn save(&mut self, state: &GameState) -> Result<(), StoreError>;
    /// Most recent snapshot, or `None` when nothing was ever saved.
    fn load(&mut self) -> Result<Option<GameState>, StoreError>;
}

impl SaveStore for Box<dyn SaveStore> {
    fn save(&mut self, state: &GameState) -> Result<(), StoreError> {
        (**self).save(state)
    }

    fn load(&mut self) -> Result<Option<GameState>, StoreError> {
        (**self).load()
    }
}

/// In-memory store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    last: Option<GameState>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots accepted so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn last(&self) -> Option<&GameState> {
        self.last.as_ref()
    }
}

impl SaveStore for MemoryStore {
    fn save(&mut self, state: &GameState) -> Result<(), StoreError> {
        self.last = Some(state.clone());
        self.saves += 1;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<GameState>, StoreError> {
        Ok(self.last.clone())
    }
}

/// Single-document JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SaveStore for JsonFileStore {
    fn save(&mut self, state: &GameState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let doc = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, doc)?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    fn load(&mut self) -> Result<Option<GameState>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

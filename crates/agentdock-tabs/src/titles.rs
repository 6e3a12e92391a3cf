//! Custom-title persistence: a small side-store keyed by session id,
//! consulted on tab creation and updated on rename. Keys are independent;
//! the storage format belongs to the [`KeyValueStore`] implementation.

use std::collections::HashMap;
use std::path::PathBuf;

use agentdock_core::backend::KeyValueStore;
use agentdock_core::error::BackendError;

const TITLE_KEY_PREFIX: &str = "custom-title:";

/// Custom-title operations over any key-value surface.
pub struct TitleStore<S: KeyValueStore> {
    kv: S,
}

impl<S: KeyValueStore> TitleStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    fn key(session_id: &str) -> String {
        format!("{TITLE_KEY_PREFIX}{session_id}")
    }

    /// Persisted custom title for a session, if any.
    pub fn load(&self, session_id: &str) -> Result<Option<String>, BackendError> {
        self.kv.get(&Self::key(session_id))
    }

    pub fn save(&mut self, session_id: &str, title: &str) -> Result<(), BackendError> {
        self.kv.set(&Self::key(session_id), title)
    }

    pub fn clear(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.kv.remove(&Self::key(session_id))
    }
}

// ─── In-memory store ──────────────────────────────────────────────

/// Volatile key-value store. Used in tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        self.map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BackendError> {
        self.map.remove(key);
        Ok(())
    }
}

// ─── File-backed store ────────────────────────────────────────────

/// Key-value store persisted as a single JSON object on disk.
/// Loaded eagerly on open; every mutation rewrites the file.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    map: HashMap<String, String>,
}

impl FileKv {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let map = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| BackendError::Persistence(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(BackendError::Io(e)),
        };
        Ok(Self { path, map })
    }

    fn persist(&self) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.map)
            .map_err(|e| BackendError::Persistence(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        self.map.insert(key.to_owned(), value.to_owned());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), BackendError> {
        if self.map.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

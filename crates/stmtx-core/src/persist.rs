//! Persistence of the last session (file label and raw statement text).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSession {
    /// Label of the last selected file(s).
    pub file_label: String,
    /// Last raw statement text.
    pub raw_text: String,
}

/// Storage boundary for [`PersistedSession`].
pub trait SessionStore {
    /// Load the saved session; a missing store yields the default.
    fn load(&self) -> Result<PersistedSession>;

    /// Overwrite the saved session.
    fn save(&self, session: &PersistedSession) -> Result<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn load(&self) -> Result<PersistedSession> {
        (**self).load()
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        (**self).save(session)
    }
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory.
    #[cfg(feature = "native")]
    pub fn default_location() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stmtx")
            .join("session.json");
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<PersistedSession> {
        if !self.path.exists() {
            return Ok(PersistedSession::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        Ok(session)
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(&self.path, content)?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store, for runs with persistence disabled.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<PersistedSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<PersistedSession> {
        Ok(self
            .session
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Ok(mut guard) = self.session.lock() {
            *guard = session.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().unwrap(), PersistedSession::default());
    }

    #[test]
    fn test_file_round_trip_uses_fixed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
        let session = PersistedSession {
            file_label: "march.pdf".to_string(),
            raw_text: "Opening balance 1,000".to_string(),
        };

        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["fileLabel"], "march.pdf");
        assert_eq!(raw["rawText"], "Opening balance 1,000");
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        let session = PersistedSession {
            file_label: "a.txt".to_string(),
            raw_text: "A".to_string(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);
    }
}

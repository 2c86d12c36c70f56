//! Persistent history of generated and custom ideas.
//!
//! History is a convenience: callers log failures here and carry on rather
//! than failing the generation that produced the ideas.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::IdeaRecord;

/// Newest entries kept by [`IdeaHistory::record`].
pub const HISTORY_LIMIT: usize = 200;

const HISTORY_KEY: &str = "idea_history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage failed: {0}")]
    Io(#[from] io::Error),

    #[error("stored history is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("history export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// String values stored under short keys.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError>;
    fn remove(&mut self, key: &str) -> Result<(), HistoryError>;
}

/// In-process store, lost when dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HistoryError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary file that is renamed over the old one, so a
/// failed write leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir` for storage. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, HistoryError> {
        let valid = !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(HistoryError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "wrote store entry");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HistoryError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ideas seen so far, oldest first.
pub struct IdeaHistory<S> {
    store: S,
}

impl<S> IdeaHistory<S>
where
    S: KeyValueStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All stored ideas, oldest first. An absent history is empty.
    pub fn load(&self) -> Result<Vec<IdeaRecord>, HistoryError> {
        match self.store.get(HISTORY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append `ideas` and keep only the newest [`HISTORY_LIMIT`] entries.
    ///
    /// Returns the number of entries stored afterwards.
    pub fn record(&mut self, ideas: &[IdeaRecord]) -> Result<usize, HistoryError> {
        let mut all = self.load()?;
        all.extend_from_slice(ideas);
        if all.len() > HISTORY_LIMIT {
            let dropped = all.len() - HISTORY_LIMIT;
            all.drain(..dropped);
            warn!(dropped, "history full, dropping oldest ideas");
        }
        self.store.set(HISTORY_KEY, &serde_json::to_string(&all)?)?;
        Ok(all.len())
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.store.remove(HISTORY_KEY)
    }
}

/// Write ideas as CSV with a `title,caption,custom` header.
pub fn export_csv<W: Write>(ideas: &[IdeaRecord], writer: W) -> Result<(), HistoryError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["title", "caption", "custom"])?;
    for idea in ideas {
        out.write_record([idea.title.as_str(), idea.caption.as_str(), if idea.is_custom { "true" } else { "false" }])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ideas(range: std::ops::Range<usize>) -> Vec<IdeaRecord> {
        range.map(|i| IdeaRecord::new(format!("idea {}", i), "caption")).collect()
    }

    #[test]
    fn test_empty_history() {
        let history = IdeaHistory::new(MemoryStore::new());
        assert!(history.load().unwrap().is_empty());
    }

    #[test]
    fn test_record_appends_and_caps() {
        let mut history = IdeaHistory::new(MemoryStore::new());
        assert_eq!(history.record(&ideas(0..150)).unwrap(), 150);
        assert_eq!(history.record(&ideas(150..260)).unwrap(), HISTORY_LIMIT);

        let stored = history.load().unwrap();
        assert_eq!(stored.len(), HISTORY_LIMIT);
        assert_eq!(stored[0].title, "idea 60");
        assert_eq!(stored.last().unwrap().title, "idea 259");
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("state");

        let mut history = IdeaHistory::new(FileStore::new(&dir));
        let custom = IdeaRecord::custom("Rename 500 photos").unwrap();
        history.record(&[IdeaRecord::new("A", "B"), custom.clone()]).unwrap();
        assert!(dir.join("idea_history.json").exists());

        let reopened = IdeaHistory::new(FileStore::new(&dir));
        assert_eq!(reopened.load().unwrap(), vec![IdeaRecord::new("A", "B"), custom]);

        history.clear().unwrap();
        assert!(reopened.load().unwrap().is_empty());
        history.clear().unwrap();
    }

    #[test]
    fn test_corrupt_history_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("idea_history.json"), "not json").unwrap();
        let history = IdeaHistory::new(FileStore::new(temp.path()));
        assert!(matches!(history.load(), Err(HistoryError::Corrupt(_))));
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(temp.path());
        assert!(matches!(store.set("../escape", "x"), Err(HistoryError::InvalidKey(_))));
        assert!(matches!(store.get(""), Err(HistoryError::InvalidKey(_))));
        store.set("drafts-1", "x").unwrap();
        assert_eq!(store.get("drafts-1").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_export_csv() {
        let mut buf = Vec::new();
        let rows = vec![
            IdeaRecord::new("Delete files, fast", "Watch this #Python"),
            IdeaRecord::custom("My own idea").unwrap(),
        ];
        export_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "title,caption,custom\n\"Delete files, fast\",Watch this #Python,false\nMy own idea,,true\n"
        );
    }
}

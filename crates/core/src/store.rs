//! Flat JSON persistence.
//!
//! Every write loads nothing incrementally: the whole value is serialized and
//! the file is overwritten. The overwrite is not atomic, so a crash halfway
//! through a write can leave a truncated file behind.

use crate::error::{CoreError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single JSON document (e.g. a game save) rewritten on every mutation.
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonDocument<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the document, or `None` if it has never been written.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| CoreError::io(&self.path, e))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Overwrites the document with `value`.
    pub fn save(&self, value: &T) -> Result<()> {
        write_pretty(&self.path, value)
    }
}

/// An append-only JSON array (orders, leads, check-ins).
#[derive(Debug, Clone)]
pub struct JsonLog<T> {
    doc: JsonDocument<Vec<T>>,
}

impl<T: Serialize + DeserializeOwned> JsonLog<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    /// All records in insertion order. A missing file is an empty log.
    pub fn load_all(&self) -> Result<Vec<T>> {
        Ok(self.doc.load()?.unwrap_or_default())
    }

    /// Loads every record, pushes `record` and writes the whole array back.
    pub fn append(&self, record: T) -> Result<usize> {
        let mut records = self.load_all()?;
        records.push(record);
        self.doc.save(&records)?;
        debug!(path = %self.path().display(), len = records.len(), "Appended record");
        Ok(records.len())
    }

    pub fn last(&self) -> Result<Option<T>> {
        Ok(self.load_all()?.pop())
    }
}

pub(crate) fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
    }
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).map_err(|e| CoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        mood: String,
        goals: Vec<String>,
        score: Option<u8>,
    }

    #[test]
    fn test_document_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let doc: JsonDocument<Entry> = JsonDocument::new(dir.path().join("state.json"));
        assert!(!doc.exists());
        assert!(doc.load().unwrap().is_none());
    }

    #[test]
    fn test_document_reload_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("nested").join("state.json"));
        let entry = Entry {
            mood: "calm".into(),
            goals: vec!["walk".into(), "read".into(), "sleep early".into()],
            score: None,
        };
        doc.save(&entry).unwrap();
        assert_eq!(doc.load().unwrap(), Some(entry));
    }

    #[test]
    fn test_log_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log: JsonLog<Entry> = JsonLog::new(dir.path().join("log.json"));
        assert!(log.load_all().unwrap().is_empty());

        for mood in ["tired", "ok", "great"] {
            log.append(Entry {
                mood: mood.into(),
                goals: vec![],
                score: Some(3),
            })
            .unwrap();
        }

        let moods: Vec<_> = log.load_all().unwrap().into_iter().map(|e| e.mood).collect();
        assert_eq!(moods, vec!["tired", "ok", "great"]);
        assert_eq!(log.last().unwrap().unwrap().mood, "great");
    }

    #[test]
    fn test_corrupt_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, "[{\"mood\": ").unwrap();
        let log: JsonLog<Entry> = JsonLog::new(path);
        assert!(matches!(log.load_all(), Err(CoreError::Json(_))));
    }
}

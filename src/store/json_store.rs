use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::session::identity::sanitize_key;
use crate::store::PersistentStore;
use crate::store::schema::AttemptHistoryData;

const ATTEMPT_HISTORY: &str = "attempt_history.json";

/// File-per-key JSON store under the platform data directory.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(default_data_dir())
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.file_path(&format!("{}.json", sanitize_key(key)))
    }

    fn load_typed<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.file_path(name);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "unreadable store file, using defaults");
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    fn save_typed<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        write_atomic(&self.file_path(name), &json)
    }

    pub fn load_attempt_history(&self) -> AttemptHistoryData {
        self.load_typed(ATTEMPT_HISTORY)
    }

    pub fn save_attempt_history(&self, data: &AttemptHistoryData) -> Result<()> {
        self.save_typed(ATTEMPT_HISTORY, data)
    }

    /// Keys of every stored blob that looks like a session snapshot.
    pub fn snapshot_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json")
                    .filter(|stem| stem.ends_with("_progress"))
                    .map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl PersistentStore for JsonStore {
    fn save(&self, key: &str, blob: &str) -> Result<()> {
        write_atomic(&self.blob_path(key), blob)
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.blob_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quizline")
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::{AttemptEntry, SCHEMA_VERSION};
    use tempfile::TempDir;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_blob_save_load_clear() {
        let (_dir, store) = make_test_store();
        assert_eq!(store.load("quiz_a_b_progress").unwrap(), None);

        store.save("quiz_a_b_progress", "{\"x\":1}").unwrap();
        assert_eq!(
            store.load("quiz_a_b_progress").unwrap().as_deref(),
            Some("{\"x\":1}")
        );

        store.save("quiz_a_b_progress", "{\"x\":2}").unwrap();
        assert_eq!(
            store.load("quiz_a_b_progress").unwrap().as_deref(),
            Some("{\"x\":2}")
        );

        store.clear("quiz_a_b_progress").unwrap();
        assert_eq!(store.load("quiz_a_b_progress").unwrap(), None);
        // Clearing an absent key is not an error.
        store.clear("quiz_a_b_progress").unwrap();
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let (dir, store) = make_test_store();
        store.save("k", "v").unwrap();
        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }

    #[test]
    fn test_snapshot_keys_lists_progress_blobs_only() {
        let (_dir, store) = make_test_store();
        store.save("quiz_b_x_progress", "{}").unwrap();
        store.save("quiz_a_x_progress", "{}").unwrap();
        store.save_attempt_history(&AttemptHistoryData::default()).unwrap();
        assert_eq!(
            store.snapshot_keys().unwrap(),
            vec!["quiz_a_x_progress".to_string(), "quiz_b_x_progress".to_string()]
        );
    }

    #[test]
    fn test_corrupt_history_falls_back_to_default() {
        let (_dir, store) = make_test_store();
        fs::write(store.file_path(ATTEMPT_HISTORY), "not json").unwrap();
        let history = store.load_attempt_history();
        assert!(history.attempts.is_empty());
        assert_eq!(history.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_attempt_history_roundtrip() {
        let (_dir, store) = make_test_store();
        let mut history = AttemptHistoryData::default();
        history.attempts.push(AttemptEntry::sample("a-1"));
        store.save_attempt_history(&history).unwrap();
        let loaded = store.load_attempt_history();
        assert_eq!(loaded.attempts.len(), 1);
        assert_eq!(loaded.attempts[0].attempt_id, "a-1");
    }
}

//! [`KeyValueStore`] kept in a single JSON file, the command-line stand-in
//! for browser storage.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use split_core::store::{KeyValueStore, StoreError};
use tracing::debug;

pub const STORE_FILE: &str = "storage.json";

/// Every call reads the file; every write rewrites it through a temporary
/// file in the same directory.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// [`STORE_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(backend(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| backend(dir, e))?;
        }
        let json =
            serde_json::to_string_pretty(entries).map_err(|e| StoreError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| backend(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| backend(&self.path, e))?;
        debug!(path = %self.path.display(), keys = entries.len(), "storage written");
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut entries = self.read_all()?;
        change(&mut entries);
        self.write_all(&entries)
    }
}

fn backend(path: &Path, e: io::Error) -> StoreError {
    StoreError::Backend(format!("{}: {e}", path.display()))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use split_core::store::{self, CURRENCY_KEY, FORM_KEY};
    use split_core::{Currency, SharePayload, SharedExpense};

    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());

        let result = store.get(FORM_KEY);

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn values_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::in_dir(dir.path()).set(CURRENCY_KEY, "GBP").unwrap();

        let result = FileStore::in_dir(dir.path()).get(CURRENCY_KEY);

        assert_eq!(result, Ok(Some("GBP".to_string())));
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("storage.json"));

        store.set("k", "v").unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn remove_deletes_only_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        store.remove("a").unwrap();

        assert_eq!(store.get("a"), Ok(None));
        assert_eq!(store.get("b"), Ok(Some("2".to_string())));
    }

    #[test]
    fn garbage_file_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        fs::write(store.path(), "{not json").unwrap();

        let result = store.get(FORM_KEY);

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn snapshot_and_currency_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        let snapshot = SharePayload {
            name1: "Alex".to_string(),
            name2: "Sam".to_string(),
            salary1: "3,500".to_string(),
            salary2: "2,500".to_string(),
            expenses: vec![SharedExpense::new("1,200", "Rent")],
            currency: Some("NZD".to_string()),
        };

        store::save_snapshot(&store, &snapshot).unwrap();

        assert_eq!(store::load_snapshot(&store), Ok(Some(snapshot)));
        assert_eq!(store::load_currency(&store, ["en-US"]), Currency::Nzd);
    }
}

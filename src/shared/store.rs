use std::collections::BTreeMap;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::shared::error::{QuantiveError, Result};

/// String-keyed persisted key-value store backing the configuration.
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Writes every entry of `values`; existing keys not named are kept.
    fn set_many(&self, values: &BTreeMap<String, String>) -> Result<()>;

    fn delete_all(&self) -> Result<()>;

    fn all(&self) -> Result<BTreeMap<String, String>>;
}

fn lock<'a>(
    map: &'a Mutex<BTreeMap<String, String>>,
) -> Result<MutexGuard<'a, BTreeMap<String, String>>> {
    map.lock()
        .map_err(|_| QuantiveError::Store("property store lock poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let mut guard = lock(&self.values)?;
        for (k, v) in values {
            guard.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        lock(&self.values)?.clear();
        Ok(())
    }

    fn all(&self) -> Result<BTreeMap<String, String>> {
        Ok(lock(&self.values)?.clone())
    }
}

/// JSON file holding a flat object of string properties.
///
/// The file is read once on open and rewritten atomically on every mutation.
#[derive(Debug)]
pub struct FilePropertyStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePropertyStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let data = fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&data).map_err(|e| {
                    QuantiveError::Store(format!("failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), count = values.len(), "opened property store");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json.as_bytes())?;
        #[cfg(unix)]
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).ok();
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PropertyStore for FilePropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = lock(&self.values)?;
        guard.insert(key.to_string(), value.to_string());
        self.persist(&guard)
    }

    fn set_many(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let mut guard = lock(&self.values)?;
        for (k, v) in values {
            guard.insert(k.clone(), v.clone());
        }
        self.persist(&guard)
    }

    fn delete_all(&self) -> Result<()> {
        let mut guard = lock(&self.values)?;
        guard.clear();
        self.persist(&guard)
    }

    fn all(&self) -> Result<BTreeMap<String, String>> {
        Ok(lock(&self.values)?.clone())
    }
}

/// `~/.config/quantive-okr/properties.json`, or relative to the working
/// directory when no home directory is known.
pub fn default_store_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("quantive-okr")
        .join("properties.json")
}

pub fn expand_path(input: &str) -> PathBuf {
    if let Some(stripped) = input
        .strip_prefix("~/")
        .or_else(|| input.strip_prefix("~\\"))
    {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(input)
}

fn home_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    } else {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_and_get() {
        let store = MemoryPropertyStore::new();
        assert_eq!(store.get("A").unwrap(), None);

        store.set("A", "1").unwrap();
        assert_eq!(store.get("A").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_memory_store_set_many_keeps_other_keys() {
        let store = MemoryPropertyStore::with_values([("KEEP", "yes")]);
        let mut batch = BTreeMap::new();
        batch.insert("A".to_string(), "1".to_string());
        batch.insert("B".to_string(), "2".to_string());
        store.set_many(&batch).unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.get("KEEP").map(String::as_str), Some("yes"));

        store.delete_all().unwrap();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("properties.json");

        let store = FilePropertyStore::open(&path).unwrap();
        store.set("SESSION_ID", "Q1 2025").unwrap();
        drop(store);

        let reopened = FilePropertyStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("SESSION_ID").unwrap(),
            Some("Q1 2025".to_string())
        );

        reopened.delete_all().unwrap();
        let again = FilePropertyStore::open(&path).unwrap();
        assert!(again.all().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        fs::write(&path, "not json").unwrap();

        let err = FilePropertyStore::open(&path).unwrap_err();
        assert!(matches!(err, QuantiveError::Store(_)));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        assert_eq!(expand_path("/tmp/x.json"), PathBuf::from("/tmp/x.json"));
    }
}

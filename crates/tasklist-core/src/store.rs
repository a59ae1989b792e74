use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;

/// Asynchronous get/set-by-key persistence service.
///
/// Every value is an opaque string; callers own the encoding.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites whatever was stored under `key`.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.values.lock().insert(key.into(), value.into());
        store
    }

    /// Synchronous peek, mostly useful in tests.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Directory-backed store: one file per key, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(file_name_for_key(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        let result = tokio::task::spawn_blocking(move || read_optional(&path))
            .await
            .map_err(io::Error::other)
            .and_then(|inner| inner);

        result.map_err(|source| StoreError::StoreRead {
            key: key.to_string(),
            source,
        })
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let result = tokio::task::spawn_blocking(move || write_atomic(&path, &value))
            .await
            .map_err(io::Error::other)
            .and_then(|inner| inner);

        result.map_err(|source| StoreError::StoreWrite {
            key: key.to_string(),
            source,
        })
    }
}

/// `@tasks` -> `tasks.data`; anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn file_name_for_key(key: &str) -> String {
    let stem: String = key
        .strip_prefix('@')
        .unwrap_or(key)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "_".to_string() } else { stem };
    format!("{stem}.data")
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    debug!(file = %path.display(), "reading value");
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_atomic(path: &Path, value: &str) -> io::Result<()> {
    debug!(file = %path.display(), bytes = value.len(), "writing value atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(value.as_bytes())?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

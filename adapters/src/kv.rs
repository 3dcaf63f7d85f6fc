//! # Local key-value storage
//!
//! Two [`KeyValueStore`] implementations:
//!
//! - [`FileKvStore`] persists each key as one file under a base directory so
//!   values survive app restarts. Each write goes to its own temporary file
//!   that is then renamed over the target, so a reader never observes a
//!   half-written value and overlapping writers never share a temp path.
//! - [`MemoryKvStore`] keeps values in process memory, for tests and
//!   throwaway shells.
//!
//! ```text
//! <base_dir>/
//! └── <key>.json
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::AdapterError;
use crate::KeyValueStore;

/// In-memory KeyValueStore.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AdapterError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Filesystem-backed KeyValueStore.
#[derive(Clone, Debug)]
pub struct FileKvStore {
    base: PathBuf,
}

impl FileKvStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.base.join(format!("{}.json", file_stem(key)))
    }
}

/// Keys may contain characters that are not valid in file names. Anything
/// outside `[A-Za-z0-9.-]` is written as `_XX` per UTF-8 byte, which keeps
/// distinct keys on distinct files.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            stem.push(byte as char);
        } else {
            let _ = write!(stem, "_{byte:02X}");
        }
    }
    stem
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AdapterError> {
        match tokio::fs::read_to_string(self.value_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        let base = self.base.clone();
        let target = self.value_path(key);
        let value = value.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(), AdapterError> {
            std::fs::create_dir_all(&base)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&base)?;
            tmp.write_all(value.as_bytes())?;
            tmp.persist(&target).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(|err| AdapterError::Unavailable(format!("storage write task failed: {err}")))?
    }

    async fn remove(&self, key: &str) -> Result<(), AdapterError> {
        match tokio::fs::remove_file(self.value_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

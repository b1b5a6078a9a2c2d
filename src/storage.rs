//! Persisted key-value storage.
//!
//! The identity provider keeps its session here across restarts; sign-out
//! purges every key that looks like it belongs to the auth subsystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};

/// Substrings that mark a key as belonging to the auth subsystem.
pub const AUTH_KEY_MARKERS: [&str; 3] = ["supabase", "sb-", "auth-token"];

/// Async string-to-string storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;

    /// Removes every listed key; unknown keys are ignored.
    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// Removes every key containing one of `markers`.
///
/// # Arguments
///
/// * `storage` - The storage to purge.
/// * `markers` - Substrings matched against each key.
///
/// # Returns
///
/// A `Result` containing the number of keys removed.
pub async fn purge_matching(storage: &dyn KeyValueStorage, markers: &[&str]) -> Result<usize> {
    let keys: Vec<String> = storage
        .keys()
        .await?
        .into_iter()
        .filter(|key| markers.iter().any(|marker| key.contains(marker)))
        .collect();

    if keys.is_empty() {
        tracing::debug!("🧹 No auth keys found in local storage");
        return Ok(0);
    }

    storage.multi_remove(&keys).await?;
    tracing::info!("🧹 Local storage purged: {} keys removed", keys.len());
    Ok(keys.len())
}

/// In-process storage, lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.lock().await.keys().cloned().collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut items = self.items.lock().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

/// Storage backed by a single JSON object on disk.
///
/// The whole file is rewritten on every mutation with owner-only permissions.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Opens (or lazily creates) the storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(AppError::StorageAccessFailed(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        sonic_rs::from_str(&contents).map_err(|e| {
            AppError::StorageAccessFailed(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let storage_err = |e: std::io::Error| {
            AppError::StorageAccessFailed(format!("Failed to write {}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
            }
        }

        let contents = sonic_rs::to_string(items)
            .map_err(|e| AppError::StorageAccessFailed(format!("Serialization failed: {}", e)))?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path).await.map_err(storage_err)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, contents.as_bytes())
            .await
            .map_err(storage_err)?;
        tokio::io::AsyncWriteExt::flush(&mut file)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.insert(key.to_owned(), value.to_owned());
        self.save(&items).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        if items.remove(key).is_some() {
            self.save(&items).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let before = items.len();
        for key in keys {
            items.remove(key);
        }
        if items.len() != before {
            self.save(&items).await?;
        }
        Ok(())
    }
}

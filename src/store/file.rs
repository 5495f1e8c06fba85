use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{StateStore, StoreError};

/// File-backed store: one JSON file per key under a state directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves either the old snapshot or the new one, never a
/// truncated mix.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.state.json"))
    }

    fn classify_write_error(key: &str, err: std::io::Error) -> StoreError {
        match err.kind() {
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => StoreError::Full {
                key: key.to_string(),
            },
            _ => StoreError::Unavailable {
                reason: err.to_string(),
            },
        }
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);

        match fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(key, file = ?path, "no state file for key");
                None
            }
            Err(err) => {
                warn!(key, file = ?path, error = %err, "state file unreadable, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| Self::classify_write_error(key, err))?;

        let path = self.entry_path(key);
        let temp_path = self.directory.join(format!("{key}.state.json.tmp"));

        fs::write(&temp_path, value)
            .await
            .map_err(|err| Self::classify_write_error(key, err))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|err| Self::classify_write_error(key, err))?;

        debug!(key, file = ?path, "state file written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, file = ?path, "state file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Unavailable {
                reason: err.to_string(),
            }),
        }
    }
}

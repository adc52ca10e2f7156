//! JSON-file store for the settings admins change at runtime: the target
//! chat and the list of required channels.
//!
//! Every operation runs under one async lock and reloads the file, so the
//! file is the only source of truth. Writes go to a temp file in the same
//! directory which is then renamed over the config file.

use crate::identifiers::{normalize_identifier, same_identifier};
use crate::observability::METRICS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub required_channels: Vec<String>,
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Corrupt(serde_json::Error),
    Encode(serde_json::Error),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "Config store IO error: {}", e),
            StoreError::Corrupt(e) => write!(f, "Config store file is corrupt: {}", e),
            StoreError::Encode(e) => write!(f, "Config store could not encode settings: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct ConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<StoredConfig> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredConfig::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(StoreError::Corrupt)
    }

    async fn save(&self, config: &StoredConfig) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(config).map_err(StoreError::Encode)?;
        let tmp = self.temp_path();

        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        METRICS.increment_config_changes();
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.json".to_string());

        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }

    pub async fn snapshot(&self) -> StoreResult<StoredConfig> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn get_chat_id(&self) -> StoreResult<Option<i64>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.chat_id)
    }

    pub async fn set_chat_id(&self, chat_id: i64) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut config = self.load().await?;
        config.chat_id = Some(chat_id);
        self.save(&config).await
    }

    /// Sets the target chat only when none is stored yet. Returns whether
    /// the value was written.
    pub async fn seed_chat_id(&self, chat_id: i64) -> StoreResult<bool> {
        let _guard = self.lock.lock().await;
        let mut config = self.load().await?;
        if config.chat_id.is_some() {
            return Ok(false);
        }
        config.chat_id = Some(chat_id);
        self.save(&config).await?;
        Ok(true)
    }

    pub async fn list_channels(&self) -> StoreResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.required_channels)
    }

    /// Adds a channel after normalizing it. Returns `false` for blank input
    /// or when the normalized identifier is already present.
    pub async fn add_channel(&self, channel: &str) -> StoreResult<bool> {
        let Some(normalized) = normalize_identifier(channel) else {
            return Ok(false);
        };

        let _guard = self.lock.lock().await;
        let mut config = self.load().await?;
        if contains_identifier(&config.required_channels, &normalized) {
            return Ok(false);
        }

        config.required_channels.push(normalized);
        self.save(&config).await?;
        Ok(true)
    }

    /// Removes every stored entry equal to `channel` once both sides are
    /// normalized. Returns `false` when nothing matched.
    pub async fn remove_channel(&self, channel: &str) -> StoreResult<bool> {
        let Some(normalized) = normalize_identifier(channel) else {
            return Ok(false);
        };

        let _guard = self.lock.lock().await;
        let mut config = self.load().await?;
        let before = config.required_channels.len();
        config
            .required_channels
            .retain(|stored| !matches_stored(stored, &normalized));

        if config.required_channels.len() == before {
            return Ok(false);
        }

        self.save(&config).await?;
        Ok(true)
    }

    /// Swaps `old` for `new` in place, keeping the list order. If `new` is
    /// already present the old entry is just dropped.
    pub async fn replace_channel(&self, old: &str, new: &str) -> StoreResult<bool> {
        let (Some(old), Some(new)) = (normalize_identifier(old), normalize_identifier(new)) else {
            return Ok(false);
        };

        let _guard = self.lock.lock().await;
        let mut config = self.load().await?;
        let Some(index) = config
            .required_channels
            .iter()
            .position(|stored| matches_stored(stored, &old))
        else {
            return Ok(false);
        };

        if contains_identifier(&config.required_channels, &new) {
            config.required_channels.remove(index);
        } else {
            config.required_channels[index] = new;
        }

        self.save(&config).await?;
        Ok(true)
    }
}

fn matches_stored(stored: &str, normalized: &str) -> bool {
    normalize_identifier(stored)
        .map(|stored| same_identifier(&stored, normalized))
        .unwrap_or(false)
}

fn contains_identifier(channels: &[String], normalized: &str) -> bool {
    channels.iter().any(|stored| matches_stored(stored, normalized))
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let store = temp_store();
        assert_eq!(store.get_chat_id().await.unwrap(), None);
        assert!(store.list_channels().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_add_channel_round_trip() {
        let store = temp_store();

        assert!(store.add_channel("chan2").await.unwrap());
        assert_eq!(store.list_channels().await.unwrap(), vec!["@chan2"]);

        assert!(!store.add_channel("chan2").await.unwrap());
        assert!(!store.add_channel("https://t.me/chan2").await.unwrap());
        assert!(!store.add_channel("@CHAN2").await.unwrap());
        assert_eq!(store.list_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_blank_channel_is_rejected() {
        let store = temp_store();
        assert!(!store.add_channel("   ").await.unwrap());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_remove_channel_uses_normalized_form() {
        let store = temp_store();
        store.add_channel("@chan1").await.unwrap();
        store.add_channel("-1005550").await.unwrap();

        assert!(store.remove_channel("chan1").await.unwrap());
        assert!(!store.remove_channel("chan1").await.unwrap());
        assert!(!store.remove_channel("5550").await.unwrap());
        assert!(store.remove_channel("-1005550").await.unwrap());
        assert!(store.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_id_persists_across_instances() {
        let store = temp_store();
        store.set_chat_id(-1001234).await.unwrap();

        let reopened = ConfigStore::open(store.path()).unwrap();
        assert_eq!(reopened.get_chat_id().await.unwrap(), Some(-1001234));
    }

    #[tokio::test]
    async fn test_seed_chat_id_does_not_override() {
        let store = temp_store();
        assert!(store.seed_chat_id(100).await.unwrap());
        assert!(!store.seed_chat_id(200).await.unwrap());
        assert_eq!(store.get_chat_id().await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_file_format_and_no_leftover_temp_files() {
        let store = temp_store();
        store.set_chat_id(100).await.unwrap();
        store.add_channel("chan1").await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["chat_id"], 100);
        assert_eq!(value["required_channels"][0], "@chan1");

        let dir = store.path().parent().unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_file_gets_defaults() {
        let store = temp_store();
        std::fs::write(store.path(), r#"{"chat_id": 42}"#).unwrap();

        assert_eq!(store.get_chat_id().await.unwrap(), Some(42));
        assert!(store.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported_and_kept() {
        let store = temp_store();
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(
            store.get_chat_id().await,
            Err(StoreError::Corrupt(_))
        ));
        assert!(store.add_channel("chan1").await.is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[test]
    fn test_encode_error_is_not_reported_as_corrupt() {
        let err = serde_json::from_str::<u8>("x").unwrap_err();
        let message = StoreError::Encode(err).to_string();

        assert!(message.contains("could not encode"));
        assert!(!message.contains("corrupt"));
    }

    #[tokio::test]
    async fn test_oversized_numeric_id_is_not_stored() {
        let store = temp_store();

        assert!(!store.add_channel("-10012345678901234567890").await.unwrap());
        assert!(store.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_channel_keeps_position() {
        let store = temp_store();
        store.add_channel("-1001").await.unwrap();
        store.add_channel("@other").await.unwrap();

        assert!(store.replace_channel("-1001", "first").await.unwrap());
        assert_eq!(
            store.list_channels().await.unwrap(),
            vec!["@first", "@other"]
        );

        assert!(!store.replace_channel("-1001", "again").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_channel_drops_duplicate() {
        let store = temp_store();
        store.add_channel("-1001").await.unwrap();
        store.add_channel("@first").await.unwrap();

        assert!(store.replace_channel("-1001", "@first").await.unwrap());
        assert_eq!(store.list_channels().await.unwrap(), vec!["@first"]);
    }
}

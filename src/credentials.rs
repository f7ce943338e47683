//! Flat-file credential store.
//!
//! Maps a Telegram user id to the Adsterra API key that user registered. The
//! whole table lives in memory and is rewritten to a single JSON object on
//! every change:
//!
//! ```json
//! { "12345": { "apiKey": "…", "user": { "id": 12345, "first_name": "Ann" } } }
//! ```
//!
//! Keys are stored in plaintext. Writes go to a sibling `.tmp` file that is
//! renamed over the store, guarded by a `.lock` file so two processes never
//! write at once.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use teloxide::types::User;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{Error, Result};

/// Telegram profile saved next to the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// User id → API key table backed by a JSON file.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    users: RwLock<BTreeMap<u64, UserRecord>>,
    /// Serializes writers so snapshots reach disk in order.
    writer: Mutex<()>,
}

impl CredentialStore {
    /// Load the store from `path`. A missing or empty file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let users = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    Error::Storage(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), users = users.len(), "Loaded credential store");
        Ok(Self {
            path,
            users: RwLock::new(users),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// API key registered for `user_id`, if any.
    pub async fn get(&self, user_id: u64) -> Option<String> {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(|record| record.api_key.clone())
    }

    pub async fn has_key(&self, user_id: u64) -> bool {
        self.users.read().await.contains_key(&user_id)
    }

    pub async fn record(&self, user_id: u64) -> Option<UserRecord> {
        self.users.read().await.get(&user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Store (or overwrite) the key for `user_id` and persist the table.
    pub async fn set(&self, user_id: u64, api_key: &str, profile: Option<UserProfile>) -> Result<()> {
        let _writer = self.writer.lock().await;
        let (previous, json) = {
            let mut users = self.users.write().await;
            let previous = users.insert(
                user_id,
                UserRecord {
                    api_key: api_key.to_string(),
                    user: profile,
                },
            );
            (previous, serde_json::to_string_pretty(&*users))
        };

        let persisted = match json {
            Ok(json) => self.persist(json).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = persisted {
            // Keep memory and disk consistent.
            let mut users = self.users.write().await;
            match previous {
                Some(record) => users.insert(user_id, record),
                None => users.remove(&user_id),
            };
            return Err(err);
        }

        info!(user_id, replaced = previous.is_some(), "Stored API key");
        Ok(())
    }

    /// Remove the key for `user_id`. Returns whether a key was present.
    pub async fn remove(&self, user_id: u64) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let (previous, json) = {
            let mut users = self.users.write().await;
            let Some(previous) = users.remove(&user_id) else {
                return Ok(false);
            };
            (previous, serde_json::to_string_pretty(&*users))
        };

        let persisted = match json {
            Ok(json) => self.persist(json).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = persisted {
            self.users.write().await.insert(user_id, previous);
            return Err(err);
        }

        info!(user_id, "Removed API key");
        Ok(true)
    }

    /// Write `json` off the async runtime.
    async fn persist(&self, json: String) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &json))
            .await
            .map_err(|e| Error::Storage(format!("Persist task failed: {}", e)))?
    }
}

/// `users.json` → `users.json<suffix>` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("users.json"));
    name.push(suffix);
    path.with_file_name(name)
}

fn lock_path(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let guard_path = lock_path(path);
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&guard_path)
        .map_err(|e| Error::Storage(format!("Failed to open {}: {}", guard_path.display(), e)))?;

    lock_file.try_lock_exclusive().map_err(|_| {
        Error::Storage(format!("{} is locked by another process", path.display()))
    })?;

    let tmp_path = sibling(path, ".tmp");
    let written = File::create(&tmp_path)
        .and_then(|mut tmp| {
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    let _ = FileExt::unlock(&lock_file);
    written?;

    debug!(path = %path.display(), "Persisted credential store");
    Ok(())
}

//! JSON-file dedup store
//!
//! The file holds one object keyed by dedup key:
//!
//! ```json
//! { "3f2a...": { "posted_at": "2024-05-01T10:00:00Z", "tags": ["#News"], "title": "..." } }
//! ```
//!
//! A plain array of keys is also accepted on load. The whole set is rewritten
//! (temp file + rename) after every successful append.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skypost_domain::{AppendOutcome, DedupError, DedupStore, PostedRecord};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default, alias = "date_posted")]
    posted_at: String,
    #[serde(default, alias = "hashtags")]
    tags: Vec<String>,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Keyed(HashMap<String, StoredEntry>),
    Keys(Vec<String>),
}

/// Dedup store persisted as a JSON file
pub struct JsonFileDedupStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl JsonFileDedupStore {
    /// Load the store from `path`. A missing or unreadable file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match fs::read(&path).await {
            Ok(bytes) => match parse_document(&bytes) {
                Ok(entries) => {
                    tracing::info!(path = %path.display(), keys = entries.len(), "Loaded dedup store");
                    entries
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "Dedup file is corrupt, starting with an empty store"
                    );
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No dedup file yet, starting with an empty store");
                HashMap::new()
            }
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to read dedup file, starting with an empty store"
                );
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn persist(&self, entries: &HashMap<String, StoredEntry>) -> Result<(), DedupError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let sorted: BTreeMap<&String, &StoredEntry> = entries.iter().collect();
        let json = serde_json::to_vec_pretty(&sorted)
            .map_err(|e| DedupError::Serialization(e.to_string()))?;

        let tmp_path = temp_path(&self.path);
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn parse_document(bytes: &[u8]) -> Result<HashMap<String, StoredEntry>, serde_json::Error> {
    let document: StoredDocument = serde_json::from_slice(bytes)?;
    Ok(match document {
        StoredDocument::Keyed(entries) => entries,
        StoredDocument::Keys(keys) => keys
            .into_iter()
            .map(|key| (key, StoredEntry::default()))
            .collect(),
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dedup.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl DedupStore for JsonFileDedupStore {
    async fn contains(&self, key: &str) -> Result<bool, DedupError> {
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn append(&self, record: PostedRecord) -> Result<AppendOutcome, DedupError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&record.key) {
            tracing::debug!(key = %record.key, "Key already exists in dedup store");
            return Ok(AppendOutcome::AlreadyExists);
        }

        let posted_at = record
            .posted_at
            .format(&Rfc3339)
            .map_err(|e| DedupError::Serialization(e.to_string()))?;
        let entry = StoredEntry {
            posted_at,
            tags: record.tags.into_iter().map(String::from).collect(),
            title: record.title,
        };

        entries.insert(record.key.clone(), entry);
        if let Err(error) = self.persist(&entries).await {
            // Keep memory and disk in agreement
            entries.remove(&record.key);
            return Err(error);
        }

        tracing::debug!(key = %record.key, path = %self.path.display(), "Recorded posted key");
        Ok(AppendOutcome::Appended)
    }

    async fn len(&self) -> Result<usize, DedupError> {
        Ok(self.entries.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use skypost_domain::Tag;
    use tempfile::TempDir;
    use time::OffsetDateTime;

    fn record(key: &str) -> PostedRecord {
        PostedRecord {
            key: key.to_string(),
            posted_at: OffsetDateTime::now_utc(),
            tags: vec![Tag::parse("#News").unwrap()],
            title: "A title".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileDedupStore::load(dir.path().join("posted.json")).await;
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("posted.json");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let store = JsonFileDedupStore::load(&path).await;
        assert_eq!(store.len().await.unwrap(), 0);

        // The store is usable and replaces the corrupt content
        store.append(record("u1")).await.unwrap();
        let reloaded = JsonFileDedupStore::load(&path).await;
        assert!(reloaded.contains("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_then_contains() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileDedupStore::load(dir.path().join("posted.json")).await;

        store.append(record("u1")).await.unwrap();

        assert!(store.contains("u1").await.unwrap());
        assert!(!store.contains("u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_survives_reload() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state").join("posted.json");

        let store = JsonFileDedupStore::load(&path).await;
        store.append(record("u1")).await.unwrap();
        store.append(record("u2")).await.unwrap();
        drop(store);

        let reloaded = JsonFileDedupStore::load(&path).await;
        assert_eq!(reloaded.keys().await, vec!["u1", "u2"]);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_append_is_idempotent_on_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("posted.json");

        let store = JsonFileDedupStore::load(&path).await;
        assert_eq!(
            store.append(record("u1")).await.unwrap(),
            AppendOutcome::Appended
        );
        let first = std::fs::read_to_string(&path).expect("read store");

        let mut again = record("u1");
        again.title = "Changed".to_string();
        assert_eq!(
            store.append(again).await.unwrap(),
            AppendOutcome::AlreadyExists
        );
        let second = std::fs::read_to_string(&path).expect("read store");

        assert_eq!(first, second);
        assert_eq!(JsonFileDedupStore::load(&path).await.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persisted_entry_shape() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("posted.json");

        let store = JsonFileDedupStore::load(&path).await;
        store.append(record("u1")).await.unwrap();

        let contents = std::fs::read_to_string(&path).expect("read store");
        let value: Value = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(value["u1"]["title"], "A title");
        assert_eq!(value["u1"]["tags"][0], "#News");
        assert!(value["u1"]["posted_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_loads_legacy_formats() {
        let dir = TempDir::new().expect("temp dir");

        let keys_path = dir.path().join("keys.json");
        std::fs::write(&keys_path, r#"["https://a.example/1", "https://a.example/2"]"#)
            .expect("write keys");
        let store = JsonFileDedupStore::load(&keys_path).await;
        assert!(store.contains("https://a.example/2").await.unwrap());

        let entries_path = dir.path().join("entries.json");
        std::fs::write(
            &entries_path,
            r##"{"abc": {"title": "Old", "date_posted": "2024-01-02T03:04:05.123456+00:00", "hashtags": ["#old"]}}"##,
        )
        .expect("write entries");
        let store = JsonFileDedupStore::load(&entries_path).await;
        assert!(store.contains("abc").await.unwrap());
    }
}

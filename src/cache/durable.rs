//! Durable tier persisting cache entries to disk
//!
//! Stores each entry as a JSON file under `<root>/<namespace>/`, named from the
//! percent-encoded key. The tier is unbounded; records stay until they are
//! invalidated, found expired, or the namespace is cleared.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

use super::{CacheEntry, CacheKey, Namespace};

/// Distinguishes temp files written concurrently for the same key
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Record stored on disk
///
/// Generic over owned and borrowed fields so writes can serialize without
/// cloning the value.
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord<K, V> {
    /// Rendered identity of the key, used for enumeration
    key: K,
    /// When the entry was created
    created_at: DateTime<Utc>,
    /// The cached value
    value: V,
}

/// Just the key of a record, for matching without decoding the value
#[derive(Debug, Deserialize)]
struct RecordKey {
    key: String,
}

/// Errors reading from the durable tier
#[derive(Debug, Error)]
pub enum DurableError {
    /// File system error
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record exists but could not be decoded
    #[error("Corrupt cache record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Reads and writes one namespace's records
#[derive(Debug, Clone)]
pub struct DurableTier {
    /// Directory holding this namespace's records
    dir: PathBuf,
}

impl DurableTier {
    /// Creates a tier rooted at `<root>/<namespace>/`
    pub fn new(root: &Path, namespace: Namespace) -> Self {
        Self {
            dir: root.join(namespace.dir_name()),
        }
    }

    /// Returns the path to the record for `key`
    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Writes an entry, replacing any existing record for the key
    ///
    /// The record is written to a temp file and renamed into place so a reader
    /// never sees a partial record.
    pub async fn write<V: Serialize>(
        &self,
        key: &CacheKey,
        entry: &CacheEntry<V>,
    ) -> Result<(), DurableError> {
        fs::create_dir_all(&self.dir).await?;

        let record = DiskRecord {
            key: key.as_str(),
            created_at: entry.created_at,
            value: &entry.value,
        };
        let json = serde_json::to_vec(&record)?;

        let path = self.record_path(key);
        let tmp = path.with_extension(format!(
            "json.tmp-{}",
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, json).await?;
        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Reads the entry for `key`
    ///
    /// # Returns
    /// * `Ok(Some(entry))` if a record for this exact key exists
    /// * `Ok(None)` if there is no record
    /// * `Err(DurableError::Corrupt)` if the record cannot be decoded
    pub async fn read<V: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry<V>>, DurableError> {
        let bytes = match fs::read(self.record_path(key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: DiskRecord<String, V> = serde_json::from_slice(&bytes)?;

        // Digest-named records could in principle collide
        if record.key != key.as_str() {
            return Ok(None);
        }
        Ok(Some(CacheEntry::new(record.value, record.created_at)))
    }

    /// Whether a record exists for `key`
    pub async fn contains(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.record_path(key)).await.unwrap_or(false)
    }

    /// Removes the record for `key`; a missing record is not an error
    pub async fn remove(&self, key: &CacheKey) -> std::io::Result<()> {
        remove_record(&self.record_path(key)).await.map(|_| ())
    }

    /// Removes every record whose key identity contains `needle`
    ///
    /// Unreadable records and records that cannot be deleted are logged and
    /// skipped; the sweep always visits every record. A record that vanished
    /// before it could be deleted counts as already removed.
    ///
    /// # Returns
    /// The number of records removed
    pub async fn remove_matching(&self, needle: &str) -> std::io::Result<usize> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record_key = match fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<RecordKey>(&bytes).map(|r| r.key),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable cache record");
                    continue;
                }
            };
            match record_key {
                Ok(key) if key.contains(needle) => match remove_record(&path).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to remove cache record");
                    }
                },
                Ok(_) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping corrupt cache record");
                }
            }
        }
        Ok(removed)
    }

    /// Deletes every record in the namespace
    pub async fn clear(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Deletes one record file
///
/// # Returns
/// * `Ok(true)` if the file was deleted
/// * `Ok(false)` if it was already gone
async fn remove_record(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        values: Vec<i32>,
    }

    fn create_test_tier() -> (DurableTier, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let tier = DurableTier::new(temp_dir.path(), Namespace::Pages);
        (tier, temp_dir)
    }

    fn data(name: &str) -> CacheEntry<TestData> {
        CacheEntry::new(
            TestData {
                name: name.to_string(),
                values: vec![3, 1, 2],
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_write_creates_file_in_namespace_directory() {
        let (tier, temp_dir) = create_test_tier();
        let key = CacheKey::page("Apple", 1);

        tier.write(&key, &data("apple")).await.expect("Write should succeed");

        let expected_path = temp_dir.path().join("pages").join(key.file_name());
        assert!(expected_path.exists(), "Cache file should exist");

        let content = std::fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("\"key\":\"Apple#page=1\""));
        assert!(content.contains("\"created_at\""));
        assert!(!content.contains("expires"), "Expiry is never stored");
    }

    #[tokio::test]
    async fn test_read_returns_none_for_missing_key() {
        let (tier, _temp_dir) = create_test_tier();

        let result = tier.read::<TestData>(&CacheKey::page("missing", 1)).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_value_and_created_at() {
        let (tier, _temp_dir) = create_test_tier();
        let key = CacheKey::page("Apple", 2);
        let original = data("roundtrip");

        tier.write(&key, &original).await.unwrap();
        let read = tier.read::<TestData>(&key).await.unwrap().unwrap();

        assert_eq!(read, original);
        assert_eq!(read.value.values, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let (tier, temp_dir) = create_test_tier();
        let key = CacheKey::page("Apple", 1);
        std::fs::create_dir_all(temp_dir.path().join("pages")).unwrap();
        std::fs::write(temp_dir.path().join("pages").join(key.file_name()), "{oops").unwrap();

        let result = tier.read::<TestData>(&key).await;

        assert!(matches!(result, Err(DurableError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_remove_matching_uses_substring() {
        let (tier, _temp_dir) = create_test_tier();
        tier.write(&CacheKey::page("Apple", 1), &data("a1")).await.unwrap();
        tier.write(&CacheKey::page("Apple", 2), &data("a2")).await.unwrap();
        tier.write(&CacheKey::page("Pineapple", 1), &data("p1")).await.unwrap();
        tier.write(&CacheKey::page("Banana", 1), &data("b1")).await.unwrap();

        let removed = tier.remove_matching("apple").await.unwrap();

        assert_eq!(removed, 1, "Only Pineapple contains lowercase 'apple'");
        assert!(tier.contains(&CacheKey::page("Apple", 1)).await);
        assert!(!tier.contains(&CacheKey::page("Pineapple", 1)).await);

        let removed = tier.remove_matching("Apple").await.unwrap();
        assert_eq!(removed, 2);
        assert!(tier.contains(&CacheKey::page("Banana", 1)).await);
    }

    #[tokio::test]
    async fn test_remove_record_treats_missing_file_as_removed() {
        let (tier, temp_dir) = create_test_tier();
        let key = CacheKey::page("Apple", 2);
        tier.write(&key, &data("a2")).await.unwrap();
        let path = temp_dir.path().join("pages").join(key.file_name());

        assert!(remove_record(&path).await.unwrap());
        assert!(!remove_record(&path).await.unwrap(), "Second delete finds nothing");
        assert!(tier.remove(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_matching_continues_past_undeletable_record() {
        let (tier, temp_dir) = create_test_tier();
        tier.write(&CacheKey::page("Apple", 1), &data("a1")).await.unwrap();
        tier.write(&CacheKey::page("Apple", 3), &data("a3")).await.unwrap();

        // A matching `.json` entry that is a directory can be read as neither a
        // record nor deleted as a file
        let blocker = temp_dir.path().join("pages").join("Apple%23page%3D2.json");
        std::fs::create_dir_all(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), "x").unwrap();

        let removed = tier.remove_matching("Apple").await.unwrap();

        assert_eq!(removed, 2);
        assert!(!tier.contains(&CacheKey::page("Apple", 1)).await);
        assert!(!tier.contains(&CacheKey::page("Apple", 3)).await);
    }

    #[tokio::test]
    async fn test_remove_matching_on_missing_directory_is_zero() {
        let (tier, _temp_dir) = create_test_tier();
        assert_eq!(tier.remove_matching("Apple").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_removes_all_records() {
        let (tier, _temp_dir) = create_test_tier();
        tier.write(&CacheKey::page("Apple", 1), &data("a1")).await.unwrap();

        tier.clear().await.unwrap();
        tier.clear().await.expect("Clearing twice is fine");

        assert!(!tier.contains(&CacheKey::page("Apple", 1)).await);
    }

    #[tokio::test]
    async fn test_overwrite_existing_record() {
        let (tier, _temp_dir) = create_test_tier();
        let key = CacheKey::page("Apple", 1);

        tier.write(&key, &data("first")).await.unwrap();
        tier.write(&key, &data("second")).await.unwrap();

        let read = tier.read::<TestData>(&key).await.unwrap().unwrap();
        assert_eq!(read.value.name, "second");
    }

    #[tokio::test]
    async fn test_long_keys_roundtrip_through_digest_names() {
        let (tier, _temp_dir) = create_test_tier();
        let key = CacheKey::page(&"q".repeat(400), 1);

        tier.write(&key, &data("long")).await.unwrap();

        let read = tier.read::<TestData>(&key).await.unwrap();
        assert!(read.is_some());
        assert_eq!(tier.remove_matching("qqqq").await.unwrap(), 1);
    }
}

//! Result persistence.
//!
//! The pipeline talks to storage through [`ResultStore`] and nothing else,
//! so the backing implementation can change without touching scrape or
//! distribution code. The shipped backend is a single JSON file keyed by
//! `LOTTERY|date`; it reloads on open, so repeated cron runs accumulate
//! history.

use std::collections::HashMap;
use std::path::PathBuf;

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreError;
use crate::models::CanonicalResult;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatistics {
    pub total_results: usize,
    pub storage_kind: &'static str,
}

/// Narrow persistence seam for canonical results.
pub trait ResultStore {
    /// Insert or replace the record for the result's `LOTTERY|date` key.
    /// Replacement is total: the new record is stored as-is, never merged
    /// with what was there before.
    async fn upsert(&self, result: &CanonicalResult) -> Result<(), StoreError>;

    /// The `n` most recent results, newest date first.
    async fn latest(&self, n: usize) -> Result<Vec<CanonicalResult>, StoreError>;

    async fn statistics(&self) -> Result<StoreStatistics, StoreError>;
}

/// JSON-file backed store. The whole map rewrites on every upsert; result
/// volume is a handful of records per day, so simplicity wins over I/O
/// cleverness here.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, CanonicalResult>>,
}

impl JsonFileStore {
    /// Open a store at `path`, loading any existing data. A missing file
    /// is an empty store, not an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), loaded = entries.len(), "result store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn flush(&self, entries: &HashMap<String, CanonicalResult>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

impl ResultStore for JsonFileStore {
    async fn upsert(&self, result: &CanonicalResult) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(result.key(), result.clone());
        self.flush(&entries).await
    }

    async fn latest(&self, n: usize) -> Result<Vec<CanonicalResult>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .cloned()
            .sorted_by(|a, b| b.date.cmp(&a.date).then(a.lottery_id.cmp(&b.lottery_id)))
            .take(n)
            .collect())
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        let entries = self.entries.lock().await;
        Ok(StoreStatistics {
            total_results: entries.len(),
            storage_kind: "json-file",
        })
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CanonicalResult>>,
}

#[cfg(test)]
impl MemoryStore {
    pub async fn get(&self, key: &str) -> Option<CanonicalResult> {
        self.entries.lock().await.get(key).cloned()
    }
}

#[cfg(test)]
impl ResultStore for MemoryStore {
    async fn upsert(&self, result: &CanonicalResult) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(result.key(), result.clone());
        Ok(())
    }

    async fn latest(&self, n: usize) -> Result<Vec<CanonicalResult>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .values()
            .cloned()
            .sorted_by(|a, b| b.date.cmp(&a.date).then(a.lottery_id.cmp(&b.lottery_id)))
            .take(n)
            .collect())
    }

    async fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        Ok(StoreStatistics {
            total_results: self.entries.lock().await.len(),
            storage_kind: "memory",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lottery, ResultStatus};
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;

    fn result(lottery: Lottery, date: &str, first: &str) -> CanonicalResult {
        let mut positions = BTreeMap::new();
        positions.insert(1u8, first.to_string());
        CanonicalResult {
            lottery_id: lottery,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            positions,
            prizes: BTreeMap::new(),
            source_url: "https://example.com".to_string(),
            status: ResultStatus::Active,
            fetched_at: Utc::now(),
        }
    }

    fn temp_path(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "loteria-feed-{tag}-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = JsonFileStore::open(temp_path("idempotent")).await.unwrap();
        let r = result(Lottery::Federal, "2024-03-10", "12345");
        store.upsert(&r).await.unwrap();
        store.upsert(&r).await.unwrap();
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_results, 1);
        assert_eq!(stats.storage_kind, "json-file");
    }

    #[tokio::test]
    async fn reupsert_replaces_the_whole_record() {
        let store = JsonFileStore::open(temp_path("replace")).await.unwrap();
        let mut full = result(Lottery::Federal, "2024-03-10", "12345");
        full.prizes.insert(1, "Avestruz".to_string());
        store.upsert(&full).await.unwrap();

        // same key, no prizes: the stored record must lose them too
        let partial = result(Lottery::Federal, "2024-03-10", "99999");
        store.upsert(&partial).await.unwrap();

        let latest = store.latest(10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].first(), Some("99999"));
        assert!(latest[0].prizes.is_empty());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let path = temp_path("reopen");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store
                .upsert(&result(Lottery::SaoPaulo, "2024-03-10", "0047"))
                .await
                .unwrap();
        }
        let reopened = JsonFileStore::open(&path).await.unwrap();
        let latest = reopened.latest(10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].lottery_id, Lottery::SaoPaulo);
        assert_eq!(latest[0].first(), Some("0047"));
    }

    #[tokio::test]
    async fn latest_orders_newest_first() {
        let store = JsonFileStore::open(temp_path("order")).await.unwrap();
        store
            .upsert(&result(Lottery::Federal, "2024-03-08", "11111"))
            .await
            .unwrap();
        store
            .upsert(&result(Lottery::Federal, "2024-03-10", "33333"))
            .await
            .unwrap();
        store
            .upsert(&result(Lottery::Goias, "2024-03-09", "2222"))
            .await
            .unwrap();

        let latest = store.latest(2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].date.to_string(), "2024-03-10");
        assert_eq!(latest[1].date.to_string(), "2024-03-09");
    }

    #[tokio::test]
    async fn memory_store_upserts_by_key() {
        let store = MemoryStore::default();
        store
            .upsert(&result(Lottery::Nacional, "2024-03-10", "4321"))
            .await
            .unwrap();
        let found = store.get("NACIONAL|2024-03-10").await.unwrap();
        assert_eq!(found.first(), Some("4321"));
        assert!(store.get("FEDERAL|2024-03-10").await.is_none());
    }
}

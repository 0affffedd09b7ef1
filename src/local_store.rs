//! Process-local key/value fallback store, persisted as a flat JSON object.
//!
//! Values are kept as strings so a corrupted entry surfaces as a parse failure at the
//! reader, which decides whether to fail closed.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod keys {
    use chrono::NaiveDate;

    pub const SELECTED_COMPANY: &str = "scorehub_selected_company_id";
    pub const CACHED_EVALUATIONS: &str = "scorehub_evaluations";
    pub const DAY_COUNTER_PREFIX: &str = "scorehub_evaluations_";
    pub const ADMIN_AUTH_PREFIX: &str = "scorehub_admin_auth:";
    pub const ADMIN_AUTH_TIME_PREFIX: &str = "scorehub_admin_auth_time:";

    pub fn day_counter(date: NaiveDate) -> String {
        format!("{DAY_COUNTER_PREFIX}{}", date.format("%Y-%m-%d"))
    }

    pub fn admin_auth(scope: &str) -> String {
        format!("{ADMIN_AUTH_PREFIX}{scope}")
    }

    pub fn admin_auth_time(scope: &str) -> String {
        format!("{ADMIN_AUTH_TIME_PREFIX}{scope}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("local store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Clone, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `path` if it exists. An unreadable or malformed file starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Local store {} is corrupted, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!("Local store {} unreadable, starting empty: {}", path.display(), e);
                HashMap::new()
            }
        };
        tracing::info!("Local store loaded with {} keys", entries.len());
        Self {
            path: Some(path),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let value = value.into();
        self.update(|entries| {
            entries.insert(key.to_string(), value);
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.entries.read().await.contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
            Ok(())
        })
        .await
    }

    /// Removes every key starting with `prefix`, returning how many were dropped.
    pub async fn remove_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        if self.keys_with_prefix(prefix).await.is_empty() {
            return Ok(0);
        }
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            Ok(before - entries.len())
        })
        .await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Decodes a JSON value. Missing keys and undecodable values both read as `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring undecodable local value for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn day_count(&self, date: NaiveDate) -> u32 {
        self.get(&keys::day_counter(date))
            .await
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub async fn increment_day_count(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let key = keys::day_counter(date);
        self.update(|entries| {
            let next = entries
                .get(&key)
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .unwrap_or(0)
                + 1;
            entries.insert(key, next.to_string());
            Ok(next)
        })
        .await
    }

    /// Appends `item` to the JSON array under `key` and returns the new length.
    ///
    /// Read, append and write happen under one write lock, so concurrent callers never
    /// overwrite each other's items. An undecodable array is replaced.
    pub async fn push_json<T>(&self, key: &str, item: T) -> Result<usize, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.update(|entries| {
            let mut items: Vec<T> = match entries.get(key) {
                Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                    tracing::warn!("Replacing undecodable local list {}: {}", key, e);
                    Vec::new()
                }),
                None => Vec::new(),
            };
            items.push(item);
            entries.insert(key.to_string(), serde_json::to_string(&items)?);
            Ok(items.len())
        })
        .await
    }

    /// Applies `change` to a copy of the entries and commits it only once it is on disk.
    async fn update<R>(
        &self,
        change: impl FnOnce(&mut HashMap<String, String>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *entries = next;
        Ok(out)
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let encoded = serde_json::to_vec_pretty(entries)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[tokio::test]
    async fn test_get_set_remove() {
        let store = LocalStore::in_memory();
        assert_eq!(store.get("a").await, None);
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.as_deref(), Some("1"));
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn test_prefix_operations() {
        let store = LocalStore::in_memory();
        store.set(keys::CACHED_EVALUATIONS, "[]").await.unwrap();
        store.set("scorehub_evaluations_2025-01-01", "3").await.unwrap();
        store.set("scorehub_evaluations_2025-01-02", "1").await.unwrap();

        assert_eq!(
            store.keys_with_prefix(keys::DAY_COUNTER_PREFIX).await,
            vec![
                "scorehub_evaluations_2025-01-01".to_string(),
                "scorehub_evaluations_2025-01-02".to_string()
            ]
        );
        assert_eq!(store.remove_prefix(keys::DAY_COUNTER_PREFIX).await.unwrap(), 2);
        assert!(store.get(keys::CACHED_EVALUATIONS).await.is_some());
    }

    #[tokio::test]
    async fn test_json_values_and_corruption() {
        let store = LocalStore::in_memory();
        let encoded = serde_json::to_string(&Sample { name: "north".into() }).unwrap();
        store.set("sample", encoded).await.unwrap();
        assert_eq!(
            store.get_json::<Sample>("sample").await,
            Some(Sample { name: "north".into() })
        );

        store.set("sample", "{not json").await.unwrap();
        assert_eq!(store.get_json::<Sample>("sample").await, None);
    }

    #[tokio::test]
    async fn test_day_counter() {
        let store = LocalStore::in_memory();
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert_eq!(store.day_count(day).await, 0);
        assert_eq!(store.increment_day_count(day).await.unwrap(), 1);
        assert_eq!(store.increment_day_count(day).await.unwrap(), 2);
        assert_eq!(store.day_count(day).await, 2);

        store.set(&keys::day_counter(day), "garbage").await.unwrap();
        assert_eq!(store.day_count(day).await, 0);
    }

    #[tokio::test]
    async fn test_persists_to_disk() {
        let path = std::env::temp_dir().join(format!("scorehub-store-{}.json", uuid::Uuid::new_v4()));
        {
            let store = LocalStore::open(&path).await;
            store.set(keys::SELECTED_COMPANY, "abc").await.unwrap();
        }
        let reopened = LocalStore::open(&path).await;
        assert_eq!(reopened.get(keys::SELECTED_COMPANY).await.as_deref(), Some("abc"));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_corrupted_file_starts_empty() {
        let path = std::env::temp_dir().join(format!("scorehub-store-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not a json object").await.unwrap();
        let store = LocalStore::open(&path).await;
        assert!(store.keys_with_prefix("").await.is_empty());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_failed_write_leaves_entries_untouched() {
        let path = std::env::temp_dir()
            .join(format!("scorehub-store-{}", uuid::Uuid::new_v4()))
            .join("missing")
            .join("store.json");
        let store = LocalStore::open(&path).await;
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        assert!(store.set(keys::SELECTED_COMPANY, "abc").await.is_err());
        assert_eq!(store.get(keys::SELECTED_COMPANY).await, None);

        assert!(store.increment_day_count(day).await.is_err());
        assert_eq!(store.day_count(day).await, 0);

        assert!(store.push_json(keys::CACHED_EVALUATIONS, 7u32).await.is_err());
        assert_eq!(store.get(keys::CACHED_EVALUATIONS).await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_push_keeps_every_item() {
        let store = LocalStore::in_memory();
        let tasks: Vec<_> = (0..100u32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.push_json("list", i).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let mut items = store.get_json::<Vec<u32>>("list").await.unwrap();
        items.sort_unstable();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_push_replaces_undecodable_list() {
        let store = LocalStore::in_memory();
        store.set("list", "{broken").await.unwrap();
        assert_eq!(store.push_json("list", 1u32).await.unwrap(), 1);
        assert_eq!(store.push_json("list", 2u32).await.unwrap(), 2);
        assert_eq!(store.get_json::<Vec<u32>>("list").await, Some(vec![1, 2]));
    }
}

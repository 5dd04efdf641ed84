//! In-memory hash store
//!
//! A single shared keyspace behind a mutex, with the same observable
//! semantics as the remote store: version-guarded commits and a bucketed,
//! stateless scan cursor. Cloning the handle shares the underlying data, so
//! it also shares the single watch slot the way one connection would.

use super::{HashStore, ScanStep};
use crate::error::Result;
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hasher;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared in-memory store handle.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Keyspace>>,
}

#[derive(Default)]
struct Keyspace {
    tables: HashMap<String, HashTable>,

    /// Per-key modification counters; survive table deletion so a watch on a
    /// dropped key still fires.
    versions: HashMap<String, u64>,

    /// The one armed staleness guard: (key, version at watch time).
    watch: Option<(String, u64)>,
}

/// One hash table: field lookup plus a bucket index ordered by field hash,
/// which gives scans a stable position to resume from.
#[derive(Default)]
struct HashTable {
    fields: HashMap<String, Bytes>,
    buckets: BTreeMap<u64, Vec<String>>,
}

impl HashTable {
    fn insert(&mut self, field: String, value: Bytes) -> bool {
        let is_new = self.fields.insert(field.clone(), value).is_none();
        if is_new {
            self.buckets.entry(bucket_of(&field)).or_default().push(field);
        }
        is_new
    }

    fn remove(&mut self, field: &str) -> bool {
        if self.fields.remove(field).is_none() {
            return false;
        }
        let bucket = bucket_of(field);
        if let Some(members) = self.buckets.get_mut(&bucket) {
            members.retain(|f| f != field);
            if members.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
        true
    }
}

impl Keyspace {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn insert(&mut self, key: &str, field: &str, value: Bytes) -> bool {
        let is_new = self
            .tables
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        self.bump(key);
        is_new
    }
}

/// Bucket position of a field within the scan order.
fn bucket_of(field: &str) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(field.as_bytes());
    hasher.finish()
}

impl HashStore for MemoryStore {
    async fn put(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.insert(key, field, value))
    }

    async fn put_if_absent(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let taken = inner
            .tables
            .get(key)
            .is_some_and(|table| table.fields.contains_key(field));
        if taken {
            return Ok(false);
        }
        inner.insert(key, field, value);
        Ok(true)
    }

    async fn get(&self, key: &str, field: &str) -> Result<Option<Bytes>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .get(key)
            .and_then(|table| table.fields.get(field).cloned()))
    }

    async fn exists(&self, key: &str, field: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tables
            .get(key)
            .is_some_and(|table| table.fields.contains_key(field)))
    }

    async fn delete(&self, key: &str, field: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let removed = inner
            .tables
            .get_mut(key)
            .is_some_and(|table| table.remove(field));
        if removed {
            if inner.tables.get(key).is_some_and(|t| t.fields.is_empty()) {
                inner.tables.remove(key);
            }
            inner.bump(key);
        }
        Ok(removed)
    }

    async fn watch(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let version = inner.version(key);
        inner.watch = Some((key.to_string(), version));
        Ok(())
    }

    async fn unwatch(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.watch = None;
        Ok(())
    }

    async fn put_guarded(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if let Some((watched, version)) = inner.watch.take() {
            if inner.version(&watched) != version {
                return Ok(false);
            }
        }
        inner.insert(key, field, value);
        Ok(true)
    }

    async fn scan(&self, key: &str, cursor: u64, count: usize) -> Result<ScanStep> {
        let inner = self.inner.lock().await;
        let Some(table) = inner.tables.get(key) else {
            return Ok(ScanStep { cursor: 0, entries: Vec::new() });
        };

        let mut entries = Vec::new();
        let mut next = 0u64;
        let mut buckets = table.buckets.range(cursor..);
        while let Some((&bucket, members)) = buckets.next() {
            for field in members {
                entries.push((field.clone(), table.fields[field].clone()));
            }
            if entries.len() >= count {
                // Whole buckets are emitted, so resuming just past this one
                // never revisits or skips a stable entry.
                if let Some(resume) = bucket.checked_add(1) {
                    if buckets.next().is_some() {
                        next = resume;
                    }
                }
                break;
            }
        }

        Ok(ScanStep { cursor: next, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::default();

        assert!(store.put("h", "f1", b("v1")).await.unwrap());
        assert!(!store.put("h", "f1", b("v2")).await.unwrap());
        assert_eq!(store.get("h", "f1").await.unwrap(), Some(b("v2")));

        assert!(store.delete("h", "f1").await.unwrap());
        assert!(!store.delete("h", "f1").await.unwrap());
        assert_eq!(store.get("h", "f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryStore::default();

        assert!(store.put_if_absent("h", "f", b("first")).await.unwrap());
        assert!(!store.put_if_absent("h", "f", b("second")).await.unwrap());
        assert_eq!(store.get("h", "f").await.unwrap(), Some(b("first")));
    }

    #[tokio::test]
    async fn test_exists() {
        let store = MemoryStore::default();
        store.put("h", "f", b("v")).await.unwrap();

        assert!(store.exists("h", "f").await.unwrap());
        assert!(!store.exists("h", "other").await.unwrap());
        assert!(!store.exists("nope", "f").await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_commit_without_interference() {
        let store = MemoryStore::default();
        store.put("h", "f", b("old")).await.unwrap();

        store.watch("h").await.unwrap();
        assert!(store.put_guarded("h", "f", b("new")).await.unwrap());
        assert_eq!(store.get("h", "f").await.unwrap(), Some(b("new")));
    }

    #[tokio::test]
    async fn test_guarded_commit_aborts_after_concurrent_write() {
        let store = MemoryStore::default();
        store.put("h", "f", b("old")).await.unwrap();

        store.watch("h").await.unwrap();
        // Any structural change to the watched key fires the guard,
        // even on an unrelated field.
        store.put("h", "other", b("x")).await.unwrap();

        assert!(!store.put_guarded("h", "f", b("new")).await.unwrap());
        assert_eq!(store.get("h", "f").await.unwrap(), Some(b("old")));
    }

    #[tokio::test]
    async fn test_guarded_commit_aborts_after_delete() {
        let store = MemoryStore::default();
        store.put("h", "f", b("v")).await.unwrap();

        store.watch("h").await.unwrap();
        store.delete("h", "f").await.unwrap();

        assert!(!store.put_guarded("h", "f", b("new")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unwatch_disarms_the_guard() {
        let store = MemoryStore::default();
        store.put("h", "f", b("old")).await.unwrap();

        store.watch("h").await.unwrap();
        store.put("h", "other", b("x")).await.unwrap();
        store.unwatch().await.unwrap();

        // No guard armed: the commit is unconditional.
        assert!(store.put_guarded("h", "f", b("new")).await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_visits_every_field_exactly_once() {
        let store = MemoryStore::default();
        for i in 0..25 {
            store.put("h", &format!("field-{i}"), b("v")).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = 0;
        let mut steps = 0;
        loop {
            let step = store.scan("h", cursor, 4).await.unwrap();
            seen.extend(step.entries.into_iter().map(|(f, _)| f));
            steps += 1;
            assert!(steps < 100, "scan did not terminate");
            if step.cursor == 0 {
                break;
            }
            cursor = step.cursor;
        }

        assert_eq!(seen.len(), 25, "duplicates or misses: {seen:?}");
        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(unique.len(), 25);
        assert!(steps > 1, "expected an incremental scan, got one step");
    }

    #[tokio::test]
    async fn test_scan_of_missing_key_is_empty_and_done() {
        let store = MemoryStore::default();
        let step = store.scan("nothing", 0, 10).await.unwrap();
        assert!(step.entries.is_empty());
        assert_eq!(step.cursor, 0);
    }
}

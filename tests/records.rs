//! Record store behavior over the in-memory backend

use bytes::Bytes;
use phonestore::{
    HashStore, MemoryStore, Metadata, PhoneRecord, RecordStore, ScanStep, StoreConfig, StoreError,
    UpdateOutcome, RECORDS_KEY,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn metadata(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

fn store() -> (MemoryStore, RecordStore<MemoryStore>) {
    let backend = MemoryStore::default();
    let records = RecordStore::new(backend.clone(), StoreConfig::default()).unwrap();
    (backend, records)
}

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let (_, records) = store();

    let phone = PhoneRecord::new("one", "MOBILE", "BLACK").with_metadata(metadata(json!({ "a": 1 })));
    let id = records.create(&phone).await.unwrap();

    let fetched = records.retrieve(&id).await.unwrap().unwrap();
    assert_eq!(fetched.id.as_deref(), Some(id.as_str()));
    assert_eq!(fetched.serial_no, "one");
    assert_eq!(fetched.kind, "MOBILE");
    assert_eq!(fetched.color, "BLACK");
    assert_eq!(fetched.metadata, phone.metadata);

    let mut modified = fetched.clone();
    modified.color = "GREEN".to_string();
    assert_eq!(records.update(&modified).await.unwrap(), UpdateOutcome::Updated);
    let fetched = records.retrieve(&id).await.unwrap().unwrap();
    assert_eq!(fetched.color, "GREEN");

    assert!(records.remove(&id).await.unwrap());
    assert_eq!(records.retrieve(&id).await.unwrap(), None);
}

#[tokio::test]
async fn test_create_rejects_duplicate_id() {
    let (_, records) = store();

    let mut phone = PhoneRecord::new("one", "MOBILE", "WHITE");
    phone.id = Some("fixed".to_string());
    records.create(&phone).await.unwrap();

    let mut duplicate = PhoneRecord::new("two", "LANDLINE", "ROSE");
    duplicate.id = Some("fixed".to_string());
    match records.create(&duplicate).await.unwrap_err() {
        StoreError::IdCollision(id) => assert_eq!(id, "fixed"),
        other => panic!("expected an id collision, got {other:?}"),
    }

    // The first record survived untouched.
    let kept = records.retrieve("fixed").await.unwrap().unwrap();
    assert_eq!(kept.serial_no, "one");
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let (_, records) = store();

    let existing = PhoneRecord::new("one", "MOBILE", "BLACK");
    let id = records.create(&existing).await.unwrap();

    let mut ghost = PhoneRecord::new("ghost", "LANDLINE", "WHITE");
    ghost.id = Some(format!("{id}_"));
    assert_eq!(records.update(&ghost).await.unwrap(), UpdateOutcome::NotFound);

    // Collection unchanged: one record, the original.
    let page = records.list_all(Some(100), None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].serial_no, "one");
}

#[tokio::test]
async fn test_update_without_id_is_rejected() {
    let (_, records) = store();
    let phone = PhoneRecord::new("one", "MOBILE", "BLACK");
    assert!(matches!(
        records.update(&phone).await,
        Err(StoreError::InvalidRecord(_))
    ));
}

/// Backend that injects a concurrent write between the existence check and
/// the guarded commit of the first update, to force a conflict.
#[derive(Clone)]
struct RacingStore {
    inner: MemoryStore,
    raced: Arc<AtomicBool>,
}

impl RacingStore {
    fn new(inner: MemoryStore) -> Self {
        RacingStore {
            inner,
            raced: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl HashStore for RacingStore {
    async fn put(&self, key: &str, field: &str, value: Bytes) -> phonestore::Result<bool> {
        self.inner.put(key, field, value).await
    }

    async fn put_if_absent(&self, key: &str, field: &str, value: Bytes) -> phonestore::Result<bool> {
        self.inner.put_if_absent(key, field, value).await
    }

    async fn get(&self, key: &str, field: &str) -> phonestore::Result<Option<Bytes>> {
        self.inner.get(key, field).await
    }

    async fn exists(&self, key: &str, field: &str) -> phonestore::Result<bool> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            // Another writer sneaks in while this update is mid-protocol.
            self.inner
                .put(key, "intruder", Bytes::from_static(b"x"))
                .await?;
        }
        self.inner.exists(key, field).await
    }

    async fn delete(&self, key: &str, field: &str) -> phonestore::Result<bool> {
        self.inner.delete(key, field).await
    }

    async fn watch(&self, key: &str) -> phonestore::Result<()> {
        self.inner.watch(key).await
    }

    async fn unwatch(&self) -> phonestore::Result<()> {
        self.inner.unwatch().await
    }

    async fn put_guarded(&self, key: &str, field: &str, value: Bytes) -> phonestore::Result<bool> {
        self.inner.put_guarded(key, field, value).await
    }

    async fn scan(&self, key: &str, cursor: u64, count: usize) -> phonestore::Result<ScanStep> {
        self.inner.scan(key, cursor, count).await
    }
}

#[tokio::test]
async fn test_update_reports_conflict_on_concurrent_write() {
    let backend = MemoryStore::default();
    let records = RecordStore::new(RacingStore::new(backend.clone()), StoreConfig::default()).unwrap();

    let phone = PhoneRecord::new("one", "MOBILE", "BLACK");
    let id = records.create(&phone).await.unwrap();

    let mut modified = records.retrieve(&id).await.unwrap().unwrap();
    modified.color = "GREEN".to_string();
    assert_eq!(records.update(&modified).await.unwrap(), UpdateOutcome::Conflict);

    // The record still holds its pre-update value.
    let kept = records.retrieve(&id).await.unwrap().unwrap();
    assert_eq!(kept.color, "BLACK");

    // With the racer out of the way, the same update goes through.
    assert_eq!(records.update(&modified).await.unwrap(), UpdateOutcome::Updated);
    let kept = records.retrieve(&id).await.unwrap().unwrap();
    assert_eq!(kept.color, "GREEN");
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let (_, records) = store();

    assert!(!records.remove("unknown").await.unwrap());

    let id = records
        .create(&PhoneRecord::new("one", "MOBILE", "BEIGE"))
        .await
        .unwrap();
    assert!(records.remove(&id).await.unwrap());
    assert_eq!(records.retrieve(&id).await.unwrap(), None);
    assert!(!records.remove(&id).await.unwrap());
}

#[tokio::test]
async fn test_scan_yields_every_inserted_record() {
    let (_, records) = store();

    let mut inserted = HashSet::new();
    for i in 0..100 {
        let phone = PhoneRecord::new(format!("serial-{i}"), "MOBILE", "WHITE");
        inserted.insert(records.create(&phone).await.unwrap());
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = records.list_all(Some(10), cursor).await.unwrap();
        seen.extend(page.items.into_iter().filter_map(|p| p.id));
        pages += 1;
        assert!(pages < 1000, "scan did not terminate");
        match page.next_batch {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert!(seen.len() >= 100);
    let recovered: HashSet<String> = seen.into_iter().collect();
    assert_eq!(recovered.len(), 100);
    assert_eq!(recovered, inserted);
    assert!(pages > 1, "expected several batches, got one");
}

#[tokio::test]
async fn test_listing_skips_corrupt_records() {
    let (backend, records) = store();

    for i in 0..3 {
        records
            .create(&PhoneRecord::new(format!("good-{i}"), "LANDLINE", "ROSE"))
            .await
            .unwrap();
    }
    backend
        .put(RECORDS_KEY, "broken", Bytes::from_static(b"not a payload"))
        .await
        .unwrap();

    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let page = records.list_all(Some(10), cursor).await.unwrap();
        items.extend(page.items);
        match page.next_batch {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|p| p.id.as_deref() != Some("broken")));
}

#[tokio::test]
async fn test_retrieving_a_corrupt_record_is_an_error() {
    let (backend, records) = store();
    backend
        .put(RECORDS_KEY, "broken", Bytes::from_static(b"garbage"))
        .await
        .unwrap();

    match records.retrieve("broken").await.unwrap_err() {
        StoreError::Corrupt { id, .. } => assert_eq!(id, "broken"),
        other => panic!("expected a corruption error, got {other:?}"),
    }
}

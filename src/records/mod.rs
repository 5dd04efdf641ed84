//! Phone record store
//!
//! The public data-access API: create, retrieve, update, remove and page
//! through records, all against the single hash collection and through the
//! codec. Update implements optimistic concurrency with the store's
//! watch/guarded-commit primitives; there is no native compare-and-swap.

use crate::codec::{Encoded, PhoneCodec};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::model::PhoneRecord;
use crate::store::HashStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The one hash key under which every phone record lives.
pub const RECORDS_KEY: &str = "phn";

/// The three possible outcomes of an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record existed and now holds the new value.
    Updated,
    /// No record with this id exists; nothing was written.
    NotFound,
    /// A concurrent write invalidated the attempt; nothing was written.
    /// The caller decides whether to retry.
    Conflict,
}

/// Opaque continuation token for an in-progress listing.
///
/// Zero/absent means "start"; anything else must be passed back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanCursor(u64);

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct PhonePage {
    /// Records examined during this step. May be empty on a non-final page.
    pub items: Vec<PhoneRecord>,
    /// Present while the scan is not yet exhaustive.
    pub next_batch: Option<ScanCursor>,
}

/// Record store over any [`HashStore`] implementation.
pub struct RecordStore<S> {
    backend: S,
    codec: PhoneCodec,
    config: StoreConfig,
}

impl<S: HashStore> RecordStore<S> {
    /// Wire the store to a backend. Fails only if the standard enumeration
    /// registries cannot be built.
    pub fn new(backend: S, config: StoreConfig) -> Result<Self> {
        Ok(RecordStore {
            backend,
            codec: PhoneCodec::new()?,
            config,
        })
    }

    /// Persist a new record and return its id.
    ///
    /// A record without an id gets a generated one. An already-taken id is an
    /// [`StoreError::IdCollision`]: with random generation this should never
    /// happen and indicates an id-space collision or a caller-supplied
    /// duplicate.
    pub async fn create(&self, record: &PhoneRecord) -> Result<String> {
        let Encoded { key, payload } = self.codec.encode(record)?;

        if !self.backend.put_if_absent(RECORDS_KEY, &key, payload).await? {
            return Err(StoreError::IdCollision(key));
        }
        debug!(id = %key, "record created");
        Ok(key)
    }

    /// Fetch a record by id. An unknown id is `Ok(None)`, not an error.
    pub async fn retrieve(&self, id: &str) -> Result<Option<PhoneRecord>> {
        match self.backend.get(RECORDS_KEY, id).await? {
            Some(payload) => Ok(Some(self.codec.decode(id, &payload)?)),
            None => Ok(None),
        }
    }

    /// Replace an existing record, optimistically.
    ///
    /// Watches the collection, checks the record exists, then commits the new
    /// payload under the guard. A concurrent structural change to the
    /// collection between watch and commit aborts the write and reports
    /// [`UpdateOutcome::Conflict`]. A concurrent delete-then-recreate of the
    /// same id inside that window is indistinguishable from a benign race and
    /// goes through as a normal update.
    ///
    /// Conflict detection relies on the connection's single watch slot, so it
    /// only holds for one update in flight at a time; interleaving two updates
    /// over the same connection lets the first commit clear the guard the
    /// second armed.
    pub async fn update(&self, record: &PhoneRecord) -> Result<UpdateOutcome> {
        if record.id.is_none() {
            return Err(StoreError::InvalidRecord(
                "an update needs a record with an id".to_string(),
            ));
        }
        let Encoded { key, payload } = self.codec.encode(record)?;

        self.backend.watch(RECORDS_KEY).await?;

        let present = match self.backend.exists(RECORDS_KEY, &key).await {
            Ok(present) => present,
            Err(error) => {
                let _ = self.backend.unwatch().await;
                return Err(error);
            }
        };
        if !present {
            self.backend.unwatch().await?;
            return Ok(UpdateOutcome::NotFound);
        }

        if self.backend.put_guarded(RECORDS_KEY, &key, payload).await? {
            debug!(id = %key, "record updated");
            Ok(UpdateOutcome::Updated)
        } else {
            debug!(id = %key, "update aborted by a concurrent write");
            Ok(UpdateOutcome::Conflict)
        }
    }

    /// Delete a record. Returns whether an entry actually existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.backend.delete(RECORDS_KEY, id).await?;
        if removed {
            debug!(id, "record removed");
        }
        Ok(removed)
    }

    /// Perform one step of a cursor-based listing over the whole collection.
    ///
    /// `batch_size` is a hint for how many entries to examine, clamped to the
    /// configured maximum; it caps neither the result size nor guarantees it.
    /// The scan is not isolated from concurrent mutation: entries present for
    /// its entire duration are returned at least once, churn may be seen zero
    /// or more times. Records that fail to decode are logged and skipped so
    /// one corrupt payload cannot take down the listing.
    pub async fn list_all(
        &self,
        batch_size: Option<usize>,
        cursor: Option<ScanCursor>,
    ) -> Result<PhonePage> {
        let count = self.config.clamp_scan_count(batch_size);
        let start = cursor.map(|c| c.0).unwrap_or(0);

        let step = self.backend.scan(RECORDS_KEY, start, count).await?;

        let mut items = Vec::with_capacity(step.entries.len());
        for (field, payload) in step.entries {
            match self.codec.decode(&field, &payload) {
                Ok(record) => items.push(record),
                Err(error) => warn!(id = %field, %error, "skipping unreadable record"),
            }
        }

        let next_batch = (step.cursor != 0).then_some(ScanCursor(step.cursor));
        Ok(PhonePage { items, next_batch })
    }
}

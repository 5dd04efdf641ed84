//! Hash-collection store abstraction
//!
//! The record layer speaks to the store through [`HashStore`]: the handful of
//! hash primitives the domain needs, including the watch/guarded-commit pair
//! that stands in for a native compare-and-swap. Two implementations exist:
//! [`MemoryStore`] for in-process use and tests, [`RemoteStore`] over a live
//! connection.

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

use crate::error::Result;
use bytes::Bytes;

/// One step of a cursor-based scan.
#[derive(Debug, Clone)]
pub struct ScanStep {
    /// Continuation cursor; zero means the scan is exhausted.
    pub cursor: u64,
    /// The (field, value) pairs examined during this step.
    pub entries: Vec<(String, Bytes)>,
}

/// The hash-collection primitives the record layer is built on.
///
/// All operations address one field of the hash stored at `key`. The store
/// serializes command execution per connection; sequences of calls are NOT
/// atomic with respect to other callers, which is what `watch` plus
/// `put_guarded` exist to detect.
pub trait HashStore {
    /// Set a field unconditionally. Returns true when the field was new.
    fn put(&self, key: &str, field: &str, value: Bytes) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Set a field only if it does not exist yet. Returns whether it was set.
    fn put_if_absent(&self, key: &str, field: &str, value: Bytes) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Read a field. `None` when the field is absent.
    fn get(&self, key: &str, field: &str) -> impl std::future::Future<Output = Result<Option<Bytes>>> + Send;

    /// Whether a field exists.
    fn exists(&self, key: &str, field: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete a field. Returns whether an entry actually existed.
    fn delete(&self, key: &str, field: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Arm a staleness guard on the whole hash at `key`.
    fn watch(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Drop the current staleness guard without committing anything.
    fn unwatch(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Commit a field write under the guard armed by [`HashStore::watch`].
    ///
    /// Returns false when the guard fired, i.e. the hash changed since the
    /// watch was armed and nothing was written. Without an armed guard the
    /// write commits unconditionally.
    fn put_guarded(&self, key: &str, field: &str, value: Bytes) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Perform one scan step over the hash at `key`.
    ///
    /// `cursor` zero starts a scan; pass the returned cursor back verbatim to
    /// continue. `count` is a hint for how many entries to examine, not a cap
    /// on the result. Entries present for the entire scan are reported at
    /// least once; concurrent churn may be seen zero or more times.
    fn scan(&self, key: &str, cursor: u64, count: usize) -> impl std::future::Future<Output = Result<ScanStep>> + Send;
}

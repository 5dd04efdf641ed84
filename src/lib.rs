//! phonestore - storage access layer for phone records
//!
//! Maps typed phone records onto a remote Redis-style hash store: one shared
//! connection, a binary codec with label/code substitution, at-create
//! uniqueness, optimistic updates built on watch/transaction primitives, and
//! cursor-based non-blocking listing.
//!
//! Module responsibilities:
//! - `model` holds the domain entity and the enumeration registries
//! - `codec` translates records to and from persisted payloads
//! - `protocol` frames commands and replies on the wire
//! - `conn` owns the connection lifecycle (retry, supervision, shutdown)
//! - `store` abstracts the hash primitives (remote and in-memory)
//! - `records` is the public create/retrieve/update/remove/list API

pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod model;
pub mod protocol;
pub mod records;
pub mod store;

/// Re-export commonly used types
pub use codec::PhoneCodec;
pub use config::StoreConfig;
pub use conn::{ConnState, ConnectionManager};
pub use error::{Result, StoreError};
pub use model::{Enumeration, EnumerationError, Metadata, PhoneRecord};
pub use records::{PhonePage, RecordStore, ScanCursor, UpdateOutcome, RECORDS_KEY};
pub use store::{HashStore, MemoryStore, RemoteStore, ScanStep};

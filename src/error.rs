//! Error taxonomy for the storage layer
//!
//! Logical outcomes (a missing record on retrieve, the update tri-state, the
//! scan continuation) are ordinary return values and never appear here. Only
//! genuinely exceptional conditions travel through `StoreError`.

use crate::model::EnumerationError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the storage access layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An enumeration registry could not be built. Fatal at process start.
    #[error("enumeration registry misconfigured: {0}")]
    Registry(#[from] EnumerationError),

    /// The initial connection could not be established within the retry budget.
    /// Fatal for setup: the process should not start serving.
    #[error("could not connect to the store after {attempts} attempts: {source}")]
    ConnectFailed {
        /// Number of connection attempts made before giving up.
        attempts: u32,
        /// The last underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The connection is currently down; this call failed individually while
    /// the manager keeps reconnecting in the background.
    #[error("connection to the store is down")]
    ConnectionDown,

    /// The connection was shut down; no further operations are possible.
    #[error("connection to the store is closed")]
    ConnectionClosed,

    /// I/O failure on the store connection.
    #[error("store connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The store sent a reply this client cannot make sense of.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The store reported an error for a command.
    #[error("store rejected the command: {0}")]
    Server(String),

    /// A create hit an already-existing record id. With random id generation
    /// this indicates an id-space collision or a caller-supplied duplicate.
    #[error("record id '{0}' already exists in the collection")]
    IdCollision(String),

    /// The record is invalid at the domain boundary (unknown enumeration
    /// label, empty metadata, missing id on update).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A persisted payload could not be decoded. Scoped to the single
    /// offending record; listings skip it instead of failing wholesale.
    #[error("record '{id}' is corrupted: {reason}")]
    Corrupt {
        /// Id of the unreadable record.
        id: String,
        /// What went wrong while decoding it.
        reason: String,
    },
}

impl StoreError {
    /// Build a corruption error for one record.
    pub fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

//! Store connection configuration
//!
//! Filled in by whatever loads the process configuration; this layer only
//! consumes it.

use serde::Deserialize;

/// Default number of hash entries a single scan step asks the store to examine.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// Upper bound callers may request for one scan step.
pub const MAX_SCAN_COUNT: usize = 1000;

/// Connection and scan parameters for the record store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store host name or address.
    pub host: String,

    /// Store TCP port.
    pub port: u16,

    /// Optional password, sent as an AUTH handshake right after connect.
    pub password: Option<String>,

    /// Scan batch hint used when the caller does not supply one.
    pub scan_count: usize,

    /// Hard ceiling on the scan batch hint.
    pub max_scan_count: usize,
}

impl StoreConfig {
    /// The `host:port` address to dial.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Clamp a caller-supplied batch hint into the configured bounds.
    pub fn clamp_scan_count(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.scan_count)
            .clamp(1, self.max_scan_count)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            scan_count: DEFAULT_SCAN_COUNT,
            max_scan_count: MAX_SCAN_COUNT,
        }
    }
}

//! Record codec
//!
//! Translates a [`PhoneRecord`] to and from its persisted form: labels are
//! replaced by registry codes, the structure is serialized to CBOR, and the
//! store key doubles as the record id (the payload itself never carries it).
//! CBOR is self-describing, so new optional fields round-trip through an
//! unchanged reader.

use crate::error::{Result, StoreError};
use crate::model::{color_registry, type_registry, Enumeration, EnumerationError, Metadata, PhoneRecord};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Bytes of entropy behind a generated record id.
const ID_ENTROPY_BYTES: usize = 16;

/// A record ready to be written: the hash field key and the binary payload.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Hash field key, i.e. the record id.
    pub key: String,
    /// Serialized record.
    pub payload: Bytes,
}

/// On-disk shape of a record. Labels are already numeric here.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPhone {
    serial_no: String,
    #[serde(rename = "type")]
    kind: u32,
    color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

/// Encoder/decoder for phone records, wired to the standard registries.
#[derive(Debug, Clone)]
pub struct PhoneCodec {
    types: Enumeration,
    colors: Enumeration,
}

impl PhoneCodec {
    /// Build a codec over the standard type and color registries.
    pub fn new() -> std::result::Result<Self, EnumerationError> {
        Ok(PhoneCodec {
            types: type_registry()?,
            colors: color_registry()?,
        })
    }

    /// Encode a record for persistence.
    ///
    /// A record without an id gets a freshly generated one as its key; an
    /// existing id is reused verbatim. Unknown labels and empty metadata are
    /// rejected at this boundary.
    pub fn encode(&self, record: &PhoneRecord) -> Result<Encoded> {
        let kind = self
            .types
            .code_for(&record.kind)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown type label '{}'", record.kind)))?;
        let color = self
            .colors
            .code_for(&record.color)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown color label '{}'", record.color)))?;

        if record.metadata.as_ref().is_some_and(|m| m.is_empty()) {
            return Err(StoreError::InvalidRecord(
                "metadata must contain at least one entry when present".to_string(),
            ));
        }

        let stored = StoredPhone {
            serial_no: record.serial_no.clone(),
            kind,
            color,
            metadata: record.metadata.clone(),
        };

        let mut payload = Vec::new();
        ciborium::into_writer(&stored, &mut payload)
            .map_err(|e| StoreError::InvalidRecord(format!("unserializable record: {e}")))?;

        let key = match &record.id {
            Some(id) => id.clone(),
            None => generate_id(),
        };

        Ok(Encoded {
            key,
            payload: Bytes::from(payload),
        })
    }

    /// Decode a persisted payload back into a record with `key` as its id.
    ///
    /// A malformed payload or an unregistered numeric code means that single
    /// record is unreadable; the error carries the id so callers can isolate
    /// it.
    pub fn decode(&self, key: &str, payload: &[u8]) -> Result<PhoneRecord> {
        let stored: StoredPhone = ciborium::from_reader(payload)
            .map_err(|e| StoreError::corrupt(key, format!("undecodable payload: {e}")))?;

        let kind = self
            .types
            .label_for(stored.kind)
            .ok_or_else(|| StoreError::corrupt(key, format!("unregistered type code {}", stored.kind)))?;
        let color = self
            .colors
            .label_for(stored.color)
            .ok_or_else(|| StoreError::corrupt(key, format!("unregistered color code {}", stored.color)))?;

        Ok(PhoneRecord {
            id: Some(key.to_string()),
            serial_no: stored.serial_no,
            kind: kind.to_string(),
            color: color.to_string(),
            metadata: stored.metadata,
        })
    }
}

/// Generate a cryptographically random, URL-safe record id.
fn generate_id() -> String {
    let mut raw = [0u8; ID_ENTROPY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut raw);
    general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

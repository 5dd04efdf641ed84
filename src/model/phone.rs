//! The phone record entity and its standard registries

use super::enumeration::{Enumeration, EnumerationError};
use serde::{Deserialize, Serialize};

/// Arbitrary caller-supplied key/value annotations on a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The registry for the `type` field: {MOBILE, LANDLINE}.
pub fn type_registry() -> Result<Enumeration, EnumerationError> {
    Enumeration::numeric(["MOBILE", "LANDLINE"])
}

/// The registry for the `color` field: {WHITE, BLACK, BEIGE, ROSE, GREEN}.
pub fn color_registry() -> Result<Enumeration, EnumerationError> {
    Enumeration::numeric(["WHITE", "BLACK", "BEIGE", "ROSE", "GREEN"])
}

/// A phone record as seen by callers.
///
/// `kind` and `color` hold registry labels here; they only become numeric
/// codes inside the persisted payload. `id` is absent until the record has
/// been created and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRecord {
    /// Store-assigned identifier; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Free-form, immutable identity-like attribute.
    pub serial_no: String,

    /// One of the `type_registry` labels.
    #[serde(rename = "type")]
    pub kind: String,

    /// One of the `color_registry` labels.
    pub color: String,

    /// Optional annotations; must be non-empty when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl PhoneRecord {
    /// Build an unpersisted record.
    pub fn new(serial_no: impl Into<String>, kind: impl Into<String>, color: impl Into<String>) -> Self {
        PhoneRecord {
            id: None,
            serial_no: serial_no.into(),
            kind: kind.into(),
            color: color.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the record.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

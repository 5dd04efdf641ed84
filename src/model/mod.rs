//! Domain model
//!
//! The phone record entity and the label/code enumeration registries it is
//! validated against. Pure data, no store knowledge.

mod enumeration;
mod phone;

pub use enumeration::{Enumeration, EnumerationError};
pub use phone::{color_registry, type_registry, Metadata, PhoneRecord};

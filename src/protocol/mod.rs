//! RESP2 wire codec, client side
//!
//! Encodes outgoing commands as bulk-string arrays and parses the store's
//! replies. Independent of every other module.

mod frame;
mod types;

pub use frame::{decode, write_command};
pub use types::{FrameError, Reply};

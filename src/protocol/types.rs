//! RESP2 reply values and framing errors

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// A single reply from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Simple string: `+OK\r\n`
    Simple(String),

    /// Error reply: `-ERR message\r\n`
    Error(String),

    /// Integer: `:1000\r\n`
    Integer(i64),

    /// Bulk string: `$6\r\nfoobar\r\n`
    Bulk(Bytes),

    /// Null bulk string or null array: `$-1\r\n` / `*-1\r\n`
    Null,

    /// Array of replies: `*2\r\n...`
    Array(Vec<Reply>),
}

impl Reply {
    /// Extract bulk string bytes.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Take ownership of array elements.
    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "Simple({s})"),
            Reply::Error(e) => write!(f, "Error({e})"),
            Reply::Integer(i) => write!(f, "Integer({i})"),
            Reply::Bulk(b) => write!(f, "Bulk({} bytes)", b.len()),
            Reply::Null => write!(f, "Null"),
            Reply::Array(items) => write!(f, "Array({} elements)", items.len()),
        }
    }
}

/// Reply framing errors. Any of these means the connection state is suspect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The reply started with a byte that is not a RESP2 type prefix.
    #[error("unknown reply prefix '{0}'")]
    UnknownPrefix(char),

    /// A simple string or error line was not valid UTF-8.
    #[error("invalid UTF-8 in reply")]
    InvalidUtf8,

    /// A length or integer line did not parse.
    #[error("malformed integer in reply")]
    BadInteger,

    /// A bulk string or array announced a nonsensical length.
    #[error("invalid length {0} in reply")]
    BadLength(i64),

    /// Bulk string data was not terminated by CRLF.
    #[error("missing CRLF after bulk data")]
    MissingTerminator,
}

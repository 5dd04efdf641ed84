//! Remote hash store over a live connection
//!
//! Maps the [`HashStore`] primitives onto store commands (HSETNX, HGET,
//! HEXISTS, HDEL, HSCAN, WATCH/UNWATCH, MULTI/EXEC) and interprets the
//! replies. The guarded commit travels as one MULTI/HSET/EXEC batch so no
//! other caller's command can slip inside the transaction frame.

use super::{HashStore, ScanStep};
use crate::conn::Request;
use crate::error::{Result, StoreError};
use crate::protocol::{write_command, Reply};
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};

/// Handle to the shared store connection. Cheap to clone.
#[derive(Clone)]
pub struct RemoteStore {
    requests: mpsc::Sender<Request>,
}

impl RemoteStore {
    pub(crate) fn new(requests: mpsc::Sender<Request>) -> Self {
        RemoteStore { requests }
    }

    /// Send one command and await its reply.
    async fn command(&self, args: &[&[u8]]) -> Result<Reply> {
        let mut frames = BytesMut::new();
        write_command(&mut frames, args);
        let mut replies = self.exchange(frames.freeze(), 1).await?;
        replies
            .pop()
            .ok_or_else(|| StoreError::Protocol("empty reply batch".to_string()))
    }

    /// Send pre-encoded command frames and await `expected` replies.
    async fn exchange(&self, frames: Bytes, expected: usize) -> Result<Vec<Reply>> {
        let (respond, outcome) = oneshot::channel();
        let request = Request { frames, expected, respond };

        self.requests
            .send(request)
            .await
            .map_err(|_| StoreError::ConnectionClosed)?;
        outcome.await.map_err(|_| StoreError::ConnectionClosed)?
    }
}

impl HashStore for RemoteStore {
    async fn put(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let reply = self
            .command(&[b"HSET", key.as_bytes(), field.as_bytes(), &value])
            .await?;
        Ok(integer(reply)? == 1)
    }

    async fn put_if_absent(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let reply = self
            .command(&[b"HSETNX", key.as_bytes(), field.as_bytes(), &value])
            .await?;
        Ok(integer(reply)? == 1)
    }

    async fn get(&self, key: &str, field: &str) -> Result<Option<Bytes>> {
        let reply = self.command(&[b"HGET", key.as_bytes(), field.as_bytes()]).await?;
        match checked(reply)? {
            Reply::Bulk(bytes) => Ok(Some(bytes)),
            Reply::Null => Ok(None),
            other => Err(unexpected("HGET", &other)),
        }
    }

    async fn exists(&self, key: &str, field: &str) -> Result<bool> {
        let reply = self
            .command(&[b"HEXISTS", key.as_bytes(), field.as_bytes()])
            .await?;
        Ok(integer(reply)? == 1)
    }

    async fn delete(&self, key: &str, field: &str) -> Result<bool> {
        let reply = self.command(&[b"HDEL", key.as_bytes(), field.as_bytes()]).await?;
        Ok(integer(reply)? > 0)
    }

    async fn watch(&self, key: &str) -> Result<()> {
        simple_ok(self.command(&[b"WATCH", key.as_bytes()]).await?)
    }

    async fn unwatch(&self) -> Result<()> {
        simple_ok(self.command(&[b"UNWATCH"]).await?)
    }

    async fn put_guarded(&self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        let mut frames = BytesMut::new();
        write_command(&mut frames, &[b"MULTI"]);
        write_command(&mut frames, &[b"HSET", key.as_bytes(), field.as_bytes(), &value]);
        write_command(&mut frames, &[b"EXEC"]);

        let mut replies = self.exchange(frames.freeze(), 3).await?;
        let exec = replies
            .pop()
            .ok_or_else(|| StoreError::Protocol("missing EXEC reply".to_string()))?;

        // MULTI itself or the queueing of HSET may be refused.
        for queued in replies {
            checked(queued)?;
        }

        match checked(exec)? {
            // Null EXEC reply: the watched key changed, nothing was written.
            Reply::Null => Ok(false),
            Reply::Array(results) => {
                for result in results {
                    if let Reply::Error(message) = result {
                        return Err(StoreError::Server(message));
                    }
                }
                Ok(true)
            }
            other => Err(unexpected("EXEC", &other)),
        }
    }

    async fn scan(&self, key: &str, cursor: u64, count: usize) -> Result<ScanStep> {
        let cursor_arg = cursor.to_string();
        let count_arg = count.to_string();
        let reply = self
            .command(&[
                b"HSCAN",
                key.as_bytes(),
                cursor_arg.as_bytes(),
                b"COUNT",
                count_arg.as_bytes(),
            ])
            .await?;

        let mut parts = checked(reply)?
            .into_array()
            .ok_or_else(|| StoreError::Protocol("HSCAN reply is not an array".to_string()))?
            .into_iter();
        let (Some(cursor_part), Some(pairs_part)) = (parts.next(), parts.next()) else {
            return Err(StoreError::Protocol("HSCAN reply is too short".to_string()));
        };

        let next = cursor_part
            .as_bulk()
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| StoreError::Protocol("HSCAN cursor is not numeric".to_string()))?;

        let flat = pairs_part
            .into_array()
            .ok_or_else(|| StoreError::Protocol("HSCAN entries are not an array".to_string()))?;

        let mut entries = Vec::with_capacity(flat.len() / 2);
        let mut flat = flat.into_iter();
        while let (Some(field_part), Some(value_part)) = (flat.next(), flat.next()) {
            let field = field_part
                .as_bulk()
                .and_then(|b| std::str::from_utf8(b).ok())
                .ok_or_else(|| StoreError::Protocol("HSCAN field is not a string".to_string()))?
                .to_string();
            let value = value_part
                .as_bulk()
                .cloned()
                .ok_or_else(|| StoreError::Protocol("HSCAN value is not a bulk string".to_string()))?;
            entries.push((field, value));
        }

        Ok(ScanStep { cursor: next, entries })
    }
}

/// Turn a store error reply into `StoreError::Server`, pass anything else on.
fn checked(reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Error(message) => Err(StoreError::Server(message)),
        other => Ok(other),
    }
}

fn integer(reply: Reply) -> Result<i64> {
    match checked(reply)? {
        Reply::Integer(i) => Ok(i),
        other => Err(unexpected("integer command", &other)),
    }
}

fn simple_ok(reply: Reply) -> Result<()> {
    match checked(reply)? {
        Reply::Simple(_) => Ok(()),
        other => Err(unexpected("status command", &other)),
    }
}

fn unexpected(command: &str, reply: &Reply) -> StoreError {
    StoreError::Protocol(format!("unexpected {command} reply: {reply}"))
}

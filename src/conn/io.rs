//! Socket actor
//!
//! Owns the TCP stream and the read/write buffers. Requests arrive as
//! pre-encoded command frames over a queue and are answered one batch at a
//! time, which is how the store serializes command execution per connection.
//! When the link drops after first readiness the actor reconnects in the
//! background and answers callers with individual errors in the meantime.

use super::retry::RetryPolicy;
use super::ConnState;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::protocol::{self, write_command, Reply};
use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One batch of commands awaiting the matching number of replies.
pub(crate) struct Request {
    /// Pre-encoded command frames, written as one uninterrupted sequence.
    pub frames: Bytes,
    /// How many replies the batch expects.
    pub expected: usize,
    /// Where the outcome goes.
    pub respond: oneshot::Sender<Result<Vec<Reply>>>,
}

/// Why a serving session ended.
enum SessionEnd {
    /// Shutdown requested or every handle dropped.
    Closed,
    /// The link failed mid-command.
    LinkLost,
}

/// Outcome of a background reconnection round.
enum Reconnect {
    Restored(TcpStream),
    GaveUp,
    Interrupted,
}

/// Dial the store and run the optional AUTH handshake.
pub(crate) async fn establish(config: &StoreConfig) -> io::Result<TcpStream> {
    let mut stream = TcpStream::connect(config.addr()).await?;
    if let Some(password) = &config.password {
        authenticate(&mut stream, password).await?;
    }
    Ok(stream)
}

async fn authenticate(stream: &mut TcpStream, password: &str) -> io::Result<()> {
    let mut frame = BytesMut::new();
    write_command(&mut frame, &[b"AUTH", password.as_bytes()]);
    stream.write_all(&frame).await?;

    let mut buf = BytesMut::with_capacity(256);
    loop {
        let parsed = protocol::decode(&mut buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if let Some(reply) = parsed {
            return match reply {
                Reply::Simple(_) => Ok(()),
                Reply::Error(message) => Err(io::Error::new(io::ErrorKind::PermissionDenied, message)),
                other => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected AUTH reply: {other}"),
                )),
            };
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed during AUTH",
            ));
        }
    }
}

/// Actor main loop: serve while up, reconnect while down, tear down on stop.
pub(crate) async fn run(
    mut stream: TcpStream,
    config: StoreConfig,
    mut queue: mpsc::Receiver<Request>,
    shutdown: CancellationToken,
    state: watch::Sender<ConnState>,
) {
    let mut times_connected: u32 = 1;
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        match session(&mut stream, &mut buf, &mut queue, &shutdown).await {
            SessionEnd::Closed => {
                close(stream, &state).await;
                drain(&mut queue).await;
                return;
            }
            SessionEnd::LinkLost => {
                state.send_replace(ConnState::Connecting);
                buf.clear();

                match reconnect(&config, &mut queue, &shutdown, times_connected).await {
                    Reconnect::Restored(restored) => {
                        stream = restored;
                        times_connected += 1;
                        state.send_replace(ConnState::Ready);
                        info!(addr = %config.addr(), times_connected, "reconnected to the store");
                    }
                    Reconnect::GaveUp => {
                        error!(addr = %config.addr(), "unable to reconnect to the store, giving up");
                        state.send_replace(ConnState::Terminated);
                        refuse(&mut queue, &shutdown).await;
                        return;
                    }
                    Reconnect::Interrupted => {
                        state.send_replace(ConnState::Terminated);
                        drain(&mut queue).await;
                        return;
                    }
                }
            }
        }
    }
}

/// Serve requests over a healthy link until it breaks or we are asked to stop.
async fn session(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    queue: &mut mpsc::Receiver<Request>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return SessionEnd::Closed,
            maybe = queue.recv() => {
                let Some(Request { frames, expected, respond }) = maybe else {
                    return SessionEnd::Closed;
                };
                match serve(stream, buf, &frames, expected).await {
                    Ok(replies) => {
                        let _ = respond.send(Ok(replies));
                    }
                    Err(error) => {
                        warn!(%error, "command failed, treating the link as lost");
                        let _ = respond.send(Err(error));
                        return SessionEnd::LinkLost;
                    }
                }
            }
        }
    }
}

/// Write one batch of frames and collect the expected replies.
async fn serve(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    frames: &Bytes,
    expected: usize,
) -> Result<Vec<Reply>> {
    stream.write_all(frames).await?;
    stream.flush().await?;

    let mut replies = Vec::with_capacity(expected);
    while replies.len() < expected {
        if let Some(reply) = protocol::decode(buf).map_err(|e| StoreError::Protocol(e.to_string()))? {
            debug!(%reply, "reply received");
            replies.push(reply);
            continue;
        }

        let n = stream.read_buf(buf).await?;
        if n == 0 {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection reset by peer",
            )));
        }
        debug!(bytes = n, "read from the store");
    }
    Ok(replies)
}

/// Re-dial under the retry policy while failing queued calls individually.
async fn reconnect(
    config: &StoreConfig,
    queue: &mut mpsc::Receiver<Request>,
    shutdown: &CancellationToken,
    times_connected: u32,
) -> Reconnect {
    let mut policy = RetryPolicy::new(times_connected);

    loop {
        let Some(delay) = policy.next_delay() else {
            return Reconnect::GaveUp;
        };

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Reconnect::Interrupted,
                _ = &mut sleep => break,
                maybe = queue.recv() => match maybe {
                    None => return Reconnect::Interrupted,
                    Some(request) => {
                        let _ = request.respond.send(Err(StoreError::ConnectionDown));
                    }
                },
            }
        }

        match establish(config).await {
            Ok(stream) => return Reconnect::Restored(stream),
            Err(error) => {
                warn!(attempt = policy.attempts(), %error, "reconnection attempt failed");
                policy.record_failure(error);
            }
        }
    }
}

/// Terminal state after giving up: answer callers until asked to stop.
async fn refuse(queue: &mut mpsc::Receiver<Request>, shutdown: &CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                drain(queue).await;
                return;
            }
            maybe = queue.recv() => match maybe {
                None => return,
                Some(request) => {
                    let _ = request.respond.send(Err(StoreError::ConnectionDown));
                }
            },
        }
    }
}

/// Close the socket and confirm the transport teardown.
async fn close(mut stream: TcpStream, state: &watch::Sender<ConnState>) {
    if let Err(error) = stream.shutdown().await {
        debug!(%error, "socket was already gone at shutdown");
    }
    state.send_replace(ConnState::Terminated);
    debug!("connection to the store closed");
}

/// Fail everything still queued; no more requests will be accepted.
async fn drain(queue: &mut mpsc::Receiver<Request>) {
    queue.close();
    while let Some(request) = queue.recv().await {
        let _ = request.respond.send(Err(StoreError::ConnectionClosed));
    }
}

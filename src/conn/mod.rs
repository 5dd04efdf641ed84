//! Store connection lifecycle
//!
//! One shared connection for the whole process: bounded-retry setup, a socket
//! actor that serializes command batches, background reconnection with error
//! isolation once the first connect has succeeded, and a graceful shutdown
//! that waits for the socket teardown.

mod io;
mod retry;

pub(crate) use io::Request;
use retry::RetryPolicy;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::store::RemoteStore;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Depth of the pending-request queue towards the socket actor.
const REQUEST_QUEUE_DEPTH: usize = 64;

/// Connection lifecycle states. The manager is born dialing, so the
/// lifecycle starts at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Dialing (or re-dialing) the store.
    Connecting,
    /// Connected; commands flow.
    Ready,
    /// Given up or shut down; no further commands will succeed.
    Terminated,
}

/// Supervisor for the single shared store connection.
pub struct ConnectionManager {
    requests: mpsc::Sender<Request>,
    shutdown: CancellationToken,
    actor: Mutex<Option<JoinHandle<()>>>,
    state: watch::Receiver<ConnState>,
}

impl ConnectionManager {
    /// Establish the connection and start supervising it.
    ///
    /// Retries under the policy of [`retry::RetryPolicy`]; once the initial
    /// budget is exhausted the whole setup fails and the process should not
    /// start serving. After this returns, connection trouble is isolated to
    /// individual calls and never propagated as a setup failure again.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        let addr = config.addr();

        let mut policy = RetryPolicy::new(0);
        let stream = loop {
            let Some(delay) = policy.next_delay() else {
                state_tx.send_replace(ConnState::Terminated);
                return Err(StoreError::ConnectFailed {
                    attempts: policy.attempts(),
                    source: policy.give_up(),
                });
            };

            tokio::time::sleep(delay).await;
            match io::establish(&config).await {
                Ok(stream) => break stream,
                Err(error) => {
                    warn!(%addr, attempt = policy.attempts(), %error, "connection attempt failed");
                    policy.record_failure(error);
                }
            }
        };

        info!(%addr, "connected to the store");
        state_tx.send_replace(ConnState::Ready);

        let (requests, queue) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let shutdown = CancellationToken::new();
        let actor = tokio::spawn(io::run(stream, config, queue, shutdown.clone(), state_tx));

        Ok(ConnectionManager {
            requests,
            shutdown,
            actor: Mutex::new(Some(actor)),
            state: state_rx,
        })
    }

    /// A store handle multiplexed over this connection.
    pub fn store(&self) -> RemoteStore {
        RemoteStore::new(self.requests.clone())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    /// Terminate the connection and wait for the socket teardown.
    ///
    /// The one supported graceful-stop path. Calling it again after
    /// completion is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(actor) = self.actor.lock().await.take() {
            if actor.await.is_err() {
                warn!("connection task ended abnormally during shutdown");
            }
        }
        Ok(())
    }
}

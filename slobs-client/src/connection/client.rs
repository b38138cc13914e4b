//! The connection handle and its background read loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use slobs_protocol::{classify, Inbound, RpcRequest};

use crate::connection::pending::{PendingReplies, ReplyOutcome};
use crate::connection::sink::{Delivery, EventSink, SinkSlot};
use crate::error::{ClientError, Result};
use crate::transport::{Transport, TransportError, TransportRx, TransportTx};

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open, read loop running, no event listener yet
    Connected,
    /// An event sink is registered
    Listening,
    /// Transport closed; all further operations fail
    Closed,
}

/// Handle to one multiplexed duplex connection.
///
/// Cheap to clone; all clones share the same transport and read loop. Any
/// number of tasks may issue calls and notifications concurrently; each
/// call receives exactly the reply carrying its own correlation id. The
/// read loop starts as soon as the connection is opened and is aborted
/// when the last handle is dropped.
#[derive(Clone)]
pub struct Connection {
    writer: Arc<Mutex<Box<dyn TransportTx>>>,
    pending: Arc<PendingReplies>,
    events: Arc<SinkSlot>,
    state: Arc<watch::Sender<ConnectionState>>,
    _reader: Arc<ReadTask>,
}

/// Aborts the read loop once the last connection handle goes away
struct ReadTask {
    handle: JoinHandle<()>,
}

impl Drop for ReadTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Connection {
    /// Take ownership of an established transport and start the read loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: Transport>(transport: T) -> Self {
        let (tx, rx) = transport.split();
        let pending = Arc::new(PendingReplies::new());
        let events = Arc::new(SinkSlot::default());
        let (state, _) = watch::channel(ConnectionState::Connected);
        let state = Arc::new(state);

        let handle = tokio::spawn(read_loop(
            Box::new(rx) as Box<dyn TransportRx>,
            Arc::clone(&pending),
            Arc::clone(&events),
            Arc::clone(&state),
        ));

        Self {
            writer: Arc::new(Mutex::new(Box::new(tx))),
            pending,
            events,
            state,
            _reader: Arc::new(ReadTask { handle }),
        }
    }

    /// Invoke `method` on `resource` and wait for the reply.
    ///
    /// Resolves with the reply's result payload, with the remote-reported
    /// error message, or with a transport/closed failure if the connection
    /// dies first.
    pub async fn call(&self, method: &str, resource: &str, args: Vec<Value>) -> Result<Value> {
        self.dispatch_call(method, resource, args, false).await
    }

    /// Same as [`call`](Self::call), asking the remote side for its
    /// abbreviated result encoding.
    pub async fn call_compact(
        &self,
        method: &str,
        resource: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.dispatch_call(method, resource, args, true).await
    }

    async fn dispatch_call(
        &self,
        method: &str,
        resource: &str,
        args: Vec<Value>,
        compact: bool,
    ) -> Result<Value> {
        // Register before writing so a reply racing the write cannot miss
        // its slot. The slot unregisters itself if the write fails.
        let slot = self.pending.register()?;
        let envelope = RpcRequest::call(slot.id(), method, resource, args, compact)?;
        {
            let mut writer = self.writer.lock().await;
            writer.write(&envelope).await?;
        }
        tracing::debug!(id = slot.id(), method, resource, "call dispatched");

        match slot.recv().await {
            ReplyOutcome::Result(value) => Ok(value),
            ReplyOutcome::Error(message) => Err(ClientError::Remote(message)),
            ReplyOutcome::Lost(reason) => Err(ClientError::Closed(reason)),
        }
    }

    /// Send a fire-and-forget notification.
    ///
    /// Returns as soon as the envelope is written; no reply slot is
    /// registered and no reply is awaited.
    pub async fn notify(&self, method: &str, resource: &str, args: Vec<Value>) -> Result<()> {
        if let Some(reason) = self.pending.close_reason() {
            return Err(ClientError::Closed(reason));
        }
        let envelope = RpcRequest::notify(method, resource, args);
        {
            let mut writer = self.writer.lock().await;
            writer.write(&envelope).await?;
        }
        tracing::debug!(method, resource, "notification dispatched");
        Ok(())
    }

    /// Register `sink` as the destination for pushed events.
    ///
    /// Events that arrived before registration have been discarded. One
    /// registration per connection; a second call fails with
    /// [`ClientError::AlreadyListening`].
    pub fn listen_events(&self, sink: impl EventSink + 'static) -> Result<()> {
        if let Some(reason) = self.pending.close_reason() {
            return Err(ClientError::Closed(reason));
        }
        self.events.register(Box::new(sink))?;
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Listening;
                true
            } else {
                false
            }
        });
        tracing::debug!("event listener registered");
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolves once the read loop has terminated and every outstanding
    /// call has been drained.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Close the connection.
    ///
    /// Outstanding calls fail with a closed error, the read loop observes
    /// the transport shutdown and terminates, and later operations are
    /// rejected. Safe to call multiple times and from any task.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if *self.state.borrow() == ConnectionState::Closed {
            return Ok(());
        }
        // Drain before shutting the transport down so the read loop,
        // which also drains on exit, cannot record its own reason first.
        self.pending.close_all("closed locally");
        let result = match writer.close().await {
            Ok(()) | Err(TransportError::Closed) => Ok(()),
            Err(err) => Err(err),
        };
        self.state.send_replace(ConnectionState::Closed);
        tracing::debug!("connection closed by local request");
        result.map_err(ClientError::from)
    }
}

/// Drain the transport read half, routing every inbound message.
///
/// Runs until the transport fails or closes; on exit every outstanding
/// call is failed and the state signal flips to `Closed`. Undecodable
/// messages and orphan replies are dropped without stopping the loop.
async fn read_loop(
    mut rx: Box<dyn TransportRx>,
    pending: Arc<PendingReplies>,
    events: Arc<SinkSlot>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let reason = loop {
        let raw = match rx.read_one().await {
            Ok(raw) => raw,
            Err(TransportError::Closed) => {
                tracing::debug!("transport closed; read loop stopping");
                break "closed by remote".to_owned();
            }
            Err(err) => {
                tracing::error!(error = %err, "transport failed; read loop stopping");
                break err.to_string();
            }
        };

        match classify(&raw) {
            Ok(Inbound::Event(payload)) => match events.deliver(payload) {
                Delivery::Delivered => {}
                Delivery::NoListener => {
                    tracing::debug!("no event listener; discarding event");
                }
                Delivery::SinkGone => {
                    tracing::warn!("event sink closed; discarding further events");
                }
            },
            Ok(Inbound::Reply { id, result }) => {
                if !pending.complete(id, ReplyOutcome::Result(result)) {
                    tracing::warn!(id, "dropping reply with no outstanding call");
                }
            }
            Ok(Inbound::Error { id, message }) => {
                if !pending.complete(id, ReplyOutcome::Error(message)) {
                    tracing::warn!(id, "dropping error reply with no outstanding call");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable message");
            }
        }
    };

    pending.close_all(&reason);
    state.send_replace(ConnectionState::Closed);
}

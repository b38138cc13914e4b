//! Outstanding-call table shared between caller tasks and the read loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ClientError;

/// What the read loop (or the close path) hands to a waiting caller
#[derive(Debug)]
pub(crate) enum ReplyOutcome {
    /// The remote answered with a result payload
    Result(Value),
    /// The remote answered with an error message
    Error(String),
    /// The connection went away before the reply arrived
    Lost(String),
}

#[derive(Debug)]
struct TableState {
    slots: HashMap<u64, oneshot::Sender<ReplyOutcome>>,
    next_id: u64,
    /// Set once when the connection terminates; holds the drain reason
    closed: Option<String>,
}

/// Mutex-guarded table of outstanding correlation ids.
///
/// Lock discipline: the mutex is held only for map and counter operations,
/// never across an await point.
#[derive(Debug)]
pub(crate) struct PendingReplies {
    state: Mutex<TableState>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                slots: HashMap::new(),
                next_id: 1,
                closed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        // A panic elsewhere while holding the lock leaves the table itself
        // intact, so poisoning carries no extra meaning here.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate a fresh id and register a single-use reply slot for it.
    ///
    /// Ids are strictly positive and unique among outstanding calls; the
    /// counter wraps at `u64::MAX`, skipping 0 and any id still in flight.
    pub fn register(self: &Arc<Self>) -> Result<ReplySlot, ClientError> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if let Some(reason) = &state.closed {
            return Err(ClientError::Closed(reason.clone()));
        }
        let id = loop {
            let candidate = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            if candidate != 0 && !state.slots.contains_key(&candidate) {
                break candidate;
            }
        };
        state.slots.insert(id, tx);
        drop(state);
        Ok(ReplySlot {
            id,
            rx,
            table: Arc::clone(self),
            armed: true,
        })
    }

    /// Deliver an outcome to the slot registered under `id`.
    ///
    /// Returns false when no such slot exists, which makes the reply an
    /// orphan.
    pub fn complete(&self, id: u64, outcome: ReplyOutcome) -> bool {
        let slot = self.lock().slots.remove(&id);
        match slot {
            Some(tx) => {
                // The caller may have abandoned the wait between removal
                // and send; a dead receiver is fine.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a slot without delivering anything.
    fn discard(&self, id: u64) {
        self.lock().slots.remove(&id);
    }

    /// Mark the table closed and fail every outstanding slot with `reason`.
    ///
    /// Registrations racing with this call either drain here or fail with
    /// [`ClientError::Closed`]; nothing can register after the drain. The
    /// first reason recorded wins; later calls only drain leftovers.
    pub fn close_all(&self, reason: &str) {
        let drained: Vec<_> = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.to_owned());
            }
            state.slots.drain().collect()
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), reason, "failing outstanding calls");
        }
        for (_, tx) in drained {
            let _ = tx.send(ReplyOutcome::Lost(reason.to_owned()));
        }
    }

    /// Reason recorded at close, if the table is closed
    pub fn close_reason(&self) -> Option<String> {
        self.lock().closed.clone()
    }

    /// Number of calls currently waiting for a reply
    pub fn outstanding(&self) -> usize {
        self.lock().slots.len()
    }
}

/// A registered wait for one reply.
///
/// Dropping the slot before consuming it removes the registration, so an
/// abandoned call cannot leave a dead entry behind and a late reply for it
/// becomes an orphan.
#[derive(Debug)]
pub(crate) struct ReplySlot {
    id: u64,
    rx: oneshot::Receiver<ReplyOutcome>,
    table: Arc<PendingReplies>,
    armed: bool,
}

impl ReplySlot {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait until the read loop or the close path fills this slot.
    pub async fn recv(mut self) -> ReplyOutcome {
        let outcome = (&mut self.rx).await;
        // The entry is gone by now; the id may already belong to a newer
        // call, so the drop hook must not touch the table.
        self.armed = false;
        match outcome {
            Ok(outcome) => outcome,
            Err(_) => ReplyOutcome::Lost("reply slot dropped".to_owned()),
        }
    }
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        if self.armed {
            self.table.discard(self.id);
        }
    }
}

//! Event delivery to the embedding application.
//!
//! The read loop hands every event payload to the registered [`EventSink`].
//! Delivery is synchronous and must never park the read loop; adapters that
//! buffer do so through channels with non-blocking sends.

use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Returned by a sink that will never accept another event
#[derive(Debug, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Consumer of pushed event payloads, in arrival order.
pub trait EventSink: Send {
    /// Deliver one event payload.
    ///
    /// Must return without blocking. Returning `Err(SinkClosed)` stops all
    /// further delivery; the connection itself is unaffected.
    fn deliver(&mut self, payload: Value) -> Result<(), SinkClosed>;
}

/// Unbounded delivery; fails only once the receiver is gone.
impl EventSink for mpsc::UnboundedSender<Value> {
    fn deliver(&mut self, payload: Value) -> Result<(), SinkClosed> {
        self.send(payload).map_err(|_| SinkClosed)
    }
}

/// Bounded delivery; a full queue drops the event rather than stalling
/// the read loop.
impl EventSink for mpsc::Sender<Value> {
    fn deliver(&mut self, payload: Value) -> Result<(), SinkClosed> {
        match self.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("event queue full; dropping event");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkClosed),
        }
    }
}

/// Adapter turning a closure into an [`EventSink`]
pub struct CallbackSink<F>(F);

impl<F> CallbackSink<F>
where
    F: FnMut(Value) + Send,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: FnMut(Value) + Send,
{
    fn deliver(&mut self, payload: Value) -> Result<(), SinkClosed> {
        (self.0)(payload);
        Ok(())
    }
}

/// What became of one delivered event
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// No sink registered, or the sink died earlier
    NoListener,
    /// The sink just reported itself closed and was dropped
    SinkGone,
}

#[derive(Default)]
struct SlotState {
    registered: bool,
    sink: Option<Box<dyn EventSink>>,
}

/// The single event-sink registration of a connection
#[derive(Default)]
pub(crate) struct SinkSlot {
    state: Mutex<SlotState>,
}

impl SinkSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register the destination for all future events.
    ///
    /// One registration per connection; a sink that later dies does not
    /// free the slot.
    pub fn register(&self, sink: Box<dyn EventSink>) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.registered {
            return Err(ClientError::AlreadyListening);
        }
        state.registered = true;
        state.sink = Some(sink);
        Ok(())
    }

    /// Hand one payload to the registered sink, if any.
    pub fn deliver(&self, payload: Value) -> Delivery {
        let mut state = self.lock();
        match state.sink.as_mut() {
            Some(sink) => match sink.deliver(payload) {
                Ok(()) => Delivery::Delivered,
                Err(SinkClosed) => {
                    state.sink = None;
                    Delivery::SinkGone
                }
            },
            None => Delivery::NoListener,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unbounded_sender_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink: Box<dyn EventSink> = Box::new(tx);
        sink.deliver(json!(1)).unwrap();
        sink.deliver(json!(2)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), json!(1));
        assert_eq!(rx.try_recv().unwrap(), json!(2));
    }

    #[test]
    fn test_unbounded_sender_reports_closed() {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        drop(rx);
        let mut sink: Box<dyn EventSink> = Box::new(tx);
        assert!(sink.deliver(json!(1)).is_err());
    }

    #[test]
    fn test_bounded_sender_drops_on_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink: Box<dyn EventSink> = Box::new(tx);
        sink.deliver(json!("kept")).unwrap();
        // Queue is full; the event is dropped but the sink stays alive.
        sink.deliver(json!("dropped")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), json!("kept"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bounded_sender_reports_closed() {
        let (tx, rx) = mpsc::channel::<Value>(1);
        drop(rx);
        let mut sink: Box<dyn EventSink> = Box::new(tx);
        assert!(sink.deliver(json!(1)).is_err());
    }

    #[test]
    fn test_callback_sink_invoked() {
        let mut seen = Vec::new();
        let mut sink = CallbackSink::new(|payload| seen.push(payload));
        sink.deliver(json!("a")).unwrap();
        sink.deliver(json!("b")).unwrap();
        drop(sink);
        assert_eq!(seen, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_slot_rejects_second_registration() {
        let slot = SinkSlot::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        slot.register(Box::new(tx)).unwrap();
        let err = slot.register(Box::new(tx2)).unwrap_err();
        assert!(matches!(err, ClientError::AlreadyListening));
    }

    #[test]
    fn test_slot_without_registration_has_no_listener() {
        let slot = SinkSlot::default();
        assert_eq!(slot.deliver(json!(1)), Delivery::NoListener);
    }

    #[test]
    fn test_slot_drops_dead_sink_once() {
        let slot = SinkSlot::default();
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        slot.register(Box::new(tx)).unwrap();
        drop(rx);

        assert_eq!(slot.deliver(json!(1)), Delivery::SinkGone);
        assert_eq!(slot.deliver(json!(2)), Delivery::NoListener);

        // The registration itself is not freed by sink death.
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(slot.register(Box::new(tx2)).is_err());
    }
}

//! Injectable observability hook.
//!
//! The library emits `tracing` events for lifecycle and frame traffic. Callers
//! that need more (raw IPC dumps, frame counters, state audits) install an
//! [`Observer`] on the [`SessionConfig`](crate::config::SessionConfig). The
//! default is [`NoopObserver`].

use std::fmt;
use std::sync::Arc;

use crate::protocol::MessageType;
use crate::session::SessionState;

/// Callbacks invoked by sessions and decoders. All methods default to no-ops.
pub trait Observer: Send + Sync {
    /// A frame was fully written.
    fn on_frame_sent(&self, _message_type: MessageType, _length: usize) {}

    /// A frame was fully read. `message_type` is the raw byte.
    fn on_frame_received(&self, _message_type: u8, _length: usize) {}

    fn on_state_change(&self, _from: SessionState, _to: SessionState) {}

    /// The complete Arrow IPC payload of a query, before decoding.
    fn on_payload(&self, _payload: &[u8]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Shared, cloneable observer handle.
#[derive(Clone)]
pub struct ObserverHandle(Arc<dyn Observer>);

impl ObserverHandle {
    pub fn new<O: Observer + 'static>(observer: O) -> Self {
        Self(Arc::new(observer))
    }

    pub fn from_arc(observer: Arc<dyn Observer>) -> Self {
        Self(observer)
    }

    pub fn noop() -> Self {
        Self::new(NoopObserver)
    }
}

impl Default for ObserverHandle {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObserverHandle(..)")
    }
}

impl std::ops::Deref for ObserverHandle {
    type Target = dyn Observer;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

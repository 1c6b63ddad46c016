//! Payload-less, best-effort wake signals between processes.
//!
//! A wake signal only says "the shared record may have changed, go look".
//! Delivery is not guaranteed: a listener that is suspended, not yet
//! registered, or whose queue is full simply misses it. Every consumer must
//! therefore also reconcile whenever it becomes active; the signal is a
//! latency optimisation, never the source of truth.
//!
//! * [`LocalWakeHub`]: in-process broadcast between endpoints (tests and
//!   platforms without Unix sockets).
//! * [`SocketWakeChannel`]: cross-process delivery over Unix datagram
//!   sockets in a shared directory.

pub mod local;
#[cfg(unix)]
pub mod socket;

use std::sync::Arc;

use thiserror::Error;

pub use local::{LocalWakeEndpoint, LocalWakeHub};
#[cfg(unix)]
pub use socket::SocketWakeChannel;

/// Posted after every persisted change to the shared record.
pub const STATE_CHANGED: &str = "dictation-relay.state-changed";

/// Invoked on every delivered signal. Must be cheap and non-blocking; the
/// coordinator only enqueues an event from it.
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// WakeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("failed to register wake listener: {0}")]
    Register(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// WakeChannel trait
// ---------------------------------------------------------------------------

pub trait WakeChannel: Send + Sync {
    /// Fire-and-forget delivery to every listener registered by *other*
    /// endpoints.
    fn post(&self, signal: &str);

    /// Run `callback` whenever `signal` is posted while the returned
    /// subscription is alive.
    fn observe(&self, signal: &str, callback: WakeCallback)
        -> Result<WakeSubscription, WakeError>;
}

// ---------------------------------------------------------------------------
// WakeSubscription
// ---------------------------------------------------------------------------

/// RAII registration; dropping it stops delivery to the callback.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct WakeSubscription {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl WakeSubscription {
    pub fn new(on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl Drop for WakeSubscription {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl std::fmt::Debug for WakeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeSubscription")
            .field("active", &self.on_drop.is_some())
            .finish()
    }
}

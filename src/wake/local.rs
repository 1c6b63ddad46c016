//! In-process wake hub.
//!
//! Each [`LocalWakeEndpoint`] plays the part of one process. Posting from an
//! endpoint reaches the listeners of every other endpoint; a suspended
//! endpoint drops whatever is posted to it, like a backgrounded process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{WakeCallback, WakeChannel, WakeError, WakeSubscription};

struct Listener {
    id: u64,
    endpoint: u64,
    signal: String,
    suspended: Arc<AtomicBool>,
    callback: WakeCallback,
}

#[derive(Default)]
struct HubInner {
    listeners: Vec<Listener>,
    posted: u64,
}

/// Shared broadcast hub. Cheap to clone.
#[derive(Clone, Default)]
pub struct LocalWakeHub {
    inner: Arc<Mutex<HubInner>>,
    next_id: Arc<AtomicU64>,
}

impl LocalWakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new endpoint with its own identity on the hub.
    pub fn endpoint(&self) -> LocalWakeEndpoint {
        LocalWakeEndpoint {
            hub: self.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            suspended: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of signals posted through the hub so far.
    pub fn posted(&self) -> u64 {
        self.lock().posted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One participant on a [`LocalWakeHub`].
#[derive(Clone)]
pub struct LocalWakeEndpoint {
    hub: LocalWakeHub,
    id: u64,
    suspended: Arc<AtomicBool>,
}

impl LocalWakeEndpoint {
    /// While suspended, signals addressed to this endpoint are lost.
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }
}

impl WakeChannel for LocalWakeEndpoint {
    fn post(&self, signal: &str) {
        // Collect under the lock, invoke outside it: a callback may post.
        let targets: Vec<WakeCallback> = {
            let mut inner = self.hub.lock();
            inner.posted += 1;
            inner
                .listeners
                .iter()
                .filter(|l| l.endpoint != self.id && l.signal == signal)
                .filter(|l| !l.suspended.load(Ordering::SeqCst))
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };

        log::trace!("wake: local post {signal} to {} listener(s)", targets.len());
        for callback in targets {
            callback();
        }
    }

    fn observe(
        &self,
        signal: &str,
        callback: WakeCallback,
    ) -> Result<WakeSubscription, WakeError> {
        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        self.hub.lock().listeners.push(Listener {
            id,
            endpoint: self.id,
            signal: signal.to_string(),
            suspended: Arc::clone(&self.suspended),
            callback,
        });

        let hub = self.hub.clone();
        Ok(WakeSubscription::new(move || {
            hub.lock().listeners.retain(|l| l.id != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, WakeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let callback: WakeCallback = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn post_reaches_other_endpoints_only() {
        let hub = LocalWakeHub::new();
        let app = hub.endpoint();
        let keyboard = hub.endpoint();

        let (app_hits, app_cb) = counter();
        let (kb_hits, kb_cb) = counter();
        let _a = app.observe("sig", app_cb).unwrap();
        let _k = keyboard.observe("sig", kb_cb).unwrap();

        keyboard.post("sig");
        assert_eq!(app_hits.load(Ordering::SeqCst), 1);
        assert_eq!(kb_hits.load(Ordering::SeqCst), 0);
        assert_eq!(hub.posted(), 1);
    }

    #[test]
    fn other_signal_names_are_ignored() {
        let hub = LocalWakeHub::new();
        let (hits, cb) = counter();
        let _s = hub.endpoint().observe("a", cb).unwrap();
        hub.endpoint().post("b");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let hub = LocalWakeHub::new();
        let (hits, cb) = counter();
        let sub = hub.endpoint().observe("sig", cb).unwrap();
        let poster = hub.endpoint();

        poster.post("sig");
        drop(sub);
        poster.post("sig");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn suspended_endpoint_misses_signals() {
        let hub = LocalWakeHub::new();
        let listener = hub.endpoint();
        let (hits, cb) = counter();
        let _s = listener.observe("sig", cb).unwrap();
        let poster = hub.endpoint();

        listener.set_suspended(true);
        poster.post("sig");
        listener.set_suspended(false);
        poster.post("sig");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_post_without_deadlock() {
        let hub = LocalWakeHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        let (hits, cb) = counter();
        let _b_sub = b.observe("pong", cb).unwrap();

        let b_clone = b.clone();
        let _a_sub = a
            .observe("ping", Arc::new(move || b_clone.post("unrelated")))
            .unwrap();
        b.post("ping");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(hub.posted(), 2);
    }
}

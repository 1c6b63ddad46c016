//! Cloneable front door to a running [`Coordinator`](super::Coordinator).

use tokio::sync::{mpsc, oneshot, watch};

use super::deep_link::{DeepLink, DeepLinkError};
use super::view::ViewModel;
use super::CoordinatorEvent;
use crate::state::OperationState;

/// Sends intents to the coordinator loop and observes its published state.
///
/// Every method is fire-and-forget except [`snapshot`](Self::snapshot),
/// which waits until all previously sent events have been handled. Once the
/// coordinator has stopped, sends are silently dropped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: mpsc::Sender<CoordinatorEvent>,
    state: watch::Receiver<OperationState>,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        events: mpsc::Sender<CoordinatorEvent>,
        state: watch::Receiver<OperationState>,
    ) -> Self {
        Self { events, state }
    }

    pub async fn request_start(&self) {
        self.send(CoordinatorEvent::StartRequested).await;
    }

    pub async fn request_stop(&self) {
        self.send(CoordinatorEvent::StopRequested).await;
    }

    /// Reconcile now, e.g. when the window or keyboard view appears.
    pub async fn activate(&self) {
        self.send(CoordinatorEvent::Activated).await;
    }

    /// Handle an incoming deep link.
    pub async fn open_url(&self, url: &str) -> Result<(), DeepLinkError> {
        match DeepLink::parse(url)? {
            DeepLink::Record => self.request_start().await,
        }
        Ok(())
    }

    /// Local record after every event sent so far has been processed.
    /// `None` once the coordinator has stopped.
    pub async fn snapshot(&self) -> Option<OperationState> {
        let (tx, rx) = oneshot::channel();
        self.events.send(CoordinatorEvent::Snapshot(tx)).await.ok()?;
        rx.await.ok()
    }

    /// Most recently published record, without waiting.
    pub fn state(&self) -> OperationState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> ViewModel {
        ViewModel::from_state(&self.state.borrow())
    }

    /// Receiver that changes every time the coordinator publishes a record.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.clone()
    }

    pub async fn shutdown(&self) {
        self.send(CoordinatorEvent::Shutdown).await;
    }

    async fn send(&self, event: CoordinatorEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("coordinator: event dropped, loop has stopped");
        }
    }
}

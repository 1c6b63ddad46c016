//! The coordinator loop.
//!
//! [`Coordinator`] handles [`CoordinatorEvent`]s one at a time. Every write
//! to the shared record goes through [`Coordinator::advance`], which checks
//! the transition table, persists the full record, publishes it locally,
//! posts [`STATE_CHANGED`] and manages the auto-reset timer.
//!
//! "Am I driving the current operation" is the local `owner` flag; the shared
//! record never says which process wrote it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use super::handle::CoordinatorHandle;
use super::{
    capture_failed_message, upload_failed_message, CoordinatorEvent, Timing, NO_AUDIO_MESSAGE,
};
use crate::audio::Recorder;
use crate::state::{Event, OperationState, OperationStatus, StateStore};
use crate::upload::{self, Transport, UploadConfigSource, UploadError};
use crate::wake::{WakeCallback, WakeChannel, WakeSubscription, STATE_CHANGED};

const EVENT_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// CaptureBackend / TranscriptSink
// ---------------------------------------------------------------------------

/// What a process needs to record and upload. Only one cooperating process
/// should have one.
pub struct CaptureBackend {
    pub recorder: Box<dyn Recorder>,
    pub transport: Arc<dyn Transport>,
    pub config: Arc<dyn UploadConfigSource>,
}

impl CaptureBackend {
    pub fn new(
        recorder: impl Recorder + 'static,
        transport: Arc<dyn Transport>,
        config: Arc<dyn UploadConfigSource>,
    ) -> Self {
        Self {
            recorder: Box::new(recorder),
            transport,
            config,
        }
    }
}

/// Receives finished transcripts (e.g. inserts them at the text cursor).
/// A process with a sink consumes `done` records and resets them to `idle`.
pub trait TranscriptSink: Send {
    fn deliver(&mut self, text: &str);
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct PendingReset {
    generation: u64,
    /// The terminal record the reset was scheduled for.
    target: OperationState,
    task: JoinHandle<()>,
}

pub struct Coordinator {
    store: Arc<dyn StateStore>,
    wake: Arc<dyn WakeChannel>,
    timing: Timing,
    capture: Option<CaptureBackend>,
    sink: Option<Box<dyn TranscriptSink>>,

    /// Last record this process wrote or adopted.
    local: OperationState,
    /// This process started the capture for the current operation and has
    /// not yet written its terminal state.
    owner: bool,
    /// Bumped per owned operation; stale upload results are discarded.
    operation: u64,
    reset: Option<PendingReset>,
    reset_generation: u64,

    events: mpsc::WeakSender<CoordinatorEvent>,
    events_rx: mpsc::Receiver<CoordinatorEvent>,
    published: watch::Sender<OperationState>,
    subscription: Option<WakeSubscription>,
}

impl Coordinator {
    /// A coordinator and the handle used to drive it. The loop stops once
    /// every handle is dropped or [`CoordinatorHandle::shutdown`] is called.
    pub fn new(
        store: Arc<dyn StateStore>,
        wake: Arc<dyn WakeChannel>,
        timing: Timing,
    ) -> (Self, CoordinatorHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (published, state_rx) = watch::channel(store.load());

        let coordinator = Self {
            store,
            wake,
            timing,
            capture: None,
            sink: None,
            // Matches no stored record, so the first reconcile acts on
            // whatever is already persisted.
            local: OperationState::idle().without_timestamp(),
            owner: false,
            operation: 0,
            reset: None,
            reset_generation: 0,
            events: events_tx.downgrade(),
            events_rx,
            published,
            subscription: None,
        };
        (coordinator, CoordinatorHandle::new(events_tx, state_rx))
    }

    /// Make this the capture-capable process.
    pub fn with_capture(mut self, backend: CaptureBackend) -> Self {
        self.capture = Some(backend);
        self
    }

    pub fn with_sink(mut self, sink: impl TranscriptSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until shut down. Spawn this as a tokio task.
    pub async fn run(mut self) {
        self.listen();
        self.reconcile();

        let mut ticker = self.timing.activation_poll.map(|period| {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            let event = tokio::select! {
                event = self.events_rx.recv() => event,
                _ = tick(&mut ticker) => Some(CoordinatorEvent::Activated),
            };

            match event {
                None | Some(CoordinatorEvent::Shutdown) => break,
                Some(event) => self.handle(event),
            }
        }

        self.stop();
        log::info!("coordinator: stopped");
    }

    fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::StartRequested => self.request_start(),
            CoordinatorEvent::StopRequested => self.request_stop(),
            CoordinatorEvent::Wake | CoordinatorEvent::Activated => self.reconcile(),
            CoordinatorEvent::UploadFinished { operation, result } => {
                self.upload_finished(operation, result)
            }
            CoordinatorEvent::ResetDue { generation } => self.reset_due(generation),
            CoordinatorEvent::Snapshot(reply) => {
                let _ = reply.send(self.local.clone());
            }
            CoordinatorEvent::Shutdown => {}
        }
    }

    fn listen(&mut self) {
        let events = self.events.clone();
        let callback: WakeCallback = Arc::new(move || {
            if let Some(tx) = events.upgrade() {
                // A full queue already holds work that will reconcile.
                let _ = tx.try_send(CoordinatorEvent::Wake);
            }
        });

        match self.wake.observe(STATE_CHANGED, callback) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => log::warn!("coordinator: no wake signals ({e}); relying on activation"),
        }
    }

    fn stop(&mut self) {
        self.subscription = None;
        self.cancel_reset();

        if self.owner {
            let shared = self.store.load();
            if shared.same_write(&self.local) {
                log::warn!(
                    "coordinator: shutting down mid-{}; releasing operation",
                    shared.status()
                );
                if self.local.status() == OperationStatus::Recording {
                    let _ = self.stop_recorder();
                }
                self.owner = false;
                self.advance(Event::Stale, OperationState::idle());
                self.cancel_reset();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Local intents
    // -----------------------------------------------------------------------

    fn request_start(&mut self) {
        self.reconcile();

        match self.local.status() {
            OperationStatus::Recording => log::debug!("coordinator: already recording"),
            OperationStatus::Stopping | OperationStatus::Uploading => {
                log::debug!("coordinator: start ignored while {}", self.local.status())
            }
            OperationStatus::Idle | OperationStatus::Done | OperationStatus::Error => {
                if self.capture.is_some() {
                    self.begin_capture();
                } else {
                    log::info!("coordinator: requesting a recording");
                    self.advance(Event::StartRequested, OperationState::recording());
                }
            }
        }
    }

    fn request_stop(&mut self) {
        self.reconcile();

        if self.local.status() != OperationStatus::Recording {
            log::debug!("coordinator: stop ignored while {}", self.local.status());
            return;
        }

        if self.owner {
            self.finish_capture();
        } else {
            log::info!("coordinator: requesting stop");
            self.advance(Event::StopRequested, OperationState::stopping());
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    fn reconcile(&mut self) {
        let shared = self.store.load();
        let own_live = self.owner && shared.same_write(&self.local);

        if !own_live && shared.is_stale_at(Utc::now(), &self.timing.staleness) {
            log::info!("coordinator: abandoned {} record, resetting to idle", shared.status());
            self.abandon_capture();
            self.local = shared;
            self.advance(Event::Stale, OperationState::idle());
            return;
        }

        if shared.same_write(&self.local) {
            return;
        }

        if self.owner {
            if shared.status() == OperationStatus::Stopping
                && self.local.status() == OperationStatus::Recording
            {
                log::debug!("coordinator: stop requested by another process");
                self.local = shared;
                self.finish_capture();
                return;
            }
            self.abandon_capture();
        }

        match shared.status() {
            OperationStatus::Recording if self.capture.is_some() => {
                log::debug!("coordinator: recording requested by another process");
                self.local = shared;
                self.begin_capture();
            }
            OperationStatus::Stopping if self.capture.is_some() => {
                // No process holds audio for this operation.
                self.local = shared;
                self.advance(Event::NoAudio, OperationState::failed(NO_AUDIO_MESSAGE));
            }
            OperationStatus::Done if self.sink.is_some() => {
                self.local = shared;
                self.consume();
            }
            _ => self.adopt(shared),
        }
    }

    fn adopt(&mut self, shared: OperationState) {
        let both_idle = shared.status() == OperationStatus::Idle
            && self.local.status() == OperationStatus::Idle;
        if both_idle {
            self.local = shared;
            return;
        }

        log::debug!("coordinator: adopting {} from shared record", shared.status());
        self.cancel_reset();
        self.local = shared;
        self.publish();
        if self.local.status().is_terminal() {
            self.schedule_reset();
        }
    }

    // -----------------------------------------------------------------------
    // Capture and upload (owner side)
    // -----------------------------------------------------------------------

    fn begin_capture(&mut self) {
        let Some(backend) = self.capture.as_mut() else {
            return;
        };

        match backend.recorder.start() {
            Ok(()) => {
                self.owner = true;
                self.operation += 1;
                log::info!("coordinator: recording (operation {})", self.operation);
                if self.local.status() == OperationStatus::Recording {
                    // Requested elsewhere; confirm with a fresh timestamp.
                    self.persist(OperationState::recording());
                } else {
                    self.advance(Event::StartRequested, OperationState::recording());
                }
            }
            Err(e) => {
                log::error!("coordinator: recorder failed to start: {e}");
                self.advance(
                    Event::CaptureFailed,
                    OperationState::failed(capture_failed_message(&e.to_string())),
                );
            }
        }
    }

    fn finish_capture(&mut self) {
        if self.local.status() == OperationStatus::Recording {
            self.advance(Event::StopRequested, OperationState::stopping());
        }

        match self.stop_recorder() {
            Some(audio) => {
                log::debug!("coordinator: captured {} bytes, uploading", audio.len());
                self.advance(Event::CaptureFinalized, OperationState::uploading());
                self.spawn_upload(audio);
            }
            None => {
                self.owner = false;
                self.advance(Event::NoAudio, OperationState::failed(NO_AUDIO_MESSAGE));
            }
        }
    }

    fn stop_recorder(&mut self) -> Option<Vec<u8>> {
        self.capture.as_mut().and_then(|backend| backend.recorder.stop())
    }

    fn abandon_capture(&mut self) {
        if !self.owner {
            return;
        }

        log::warn!(
            "coordinator: operation {} superseded while {}; discarding local work",
            self.operation,
            self.local.status()
        );
        if self.local.status() == OperationStatus::Recording {
            let _ = self.stop_recorder();
        }
        self.owner = false;
        self.operation += 1;
    }

    fn spawn_upload(&mut self, audio: Vec<u8>) {
        let Some(backend) = self.capture.as_ref() else {
            return;
        };
        let Some(events) = self.events.upgrade() else {
            return;
        };

        let transport = Arc::clone(&backend.transport);
        let config = backend.config.upload_config();
        let operation = self.operation;
        log::debug!("coordinator: uploading with {config:?}");

        tokio::spawn(async move {
            let result = upload::transcribe(transport.as_ref(), &config, &audio).await;
            let _ = events
                .send(CoordinatorEvent::UploadFinished { operation, result })
                .await;
        });
    }

    fn upload_finished(&mut self, operation: u64, result: Result<String, UploadError>) {
        if !self.owner || operation != self.operation {
            log::debug!("coordinator: discarding result of superseded upload {operation}");
            return;
        }
        self.owner = false;

        let shared = self.store.load();
        if !shared.same_write(&self.local) {
            log::warn!("coordinator: shared record changed during upload; discarding result");
            self.reconcile();
            return;
        }

        match result {
            Ok(text) => {
                log::info!("coordinator: transcription finished ({} chars)", text.chars().count());
                self.advance(Event::UploadSucceeded, OperationState::done(text));
                if self.sink.is_some() {
                    self.consume();
                }
            }
            Err(e) => {
                log::error!("coordinator: upload failed: {e}");
                self.advance(
                    Event::UploadFailed,
                    OperationState::failed(upload_failed_message(&e)),
                );
            }
        }
    }

    fn consume(&mut self) {
        let text = self.local.transcription().unwrap_or_default().to_string();
        if let Some(sink) = self.sink.as_mut() {
            sink.deliver(&text);
        }
        log::info!("coordinator: transcript delivered");
        self.advance(Event::Consumed, OperationState::idle());
    }

    // -----------------------------------------------------------------------
    // Auto-reset
    // -----------------------------------------------------------------------

    fn schedule_reset(&mut self) {
        self.cancel_reset();
        let Some(events) = self.events.upgrade() else {
            return;
        };

        self.reset_generation += 1;
        let generation = self.reset_generation;
        let delay = self.timing.reset_after;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(CoordinatorEvent::ResetDue { generation }).await;
        });

        self.reset = Some(PendingReset {
            generation,
            target: self.local.clone(),
            task,
        });
    }

    fn cancel_reset(&mut self) {
        if let Some(pending) = self.reset.take() {
            pending.task.abort();
        }
    }

    fn reset_due(&mut self, generation: u64) {
        if !matches!(&self.reset, Some(pending) if pending.generation == generation) {
            return;
        }
        let Some(pending) = self.reset.take() else {
            return;
        };

        let shared = self.store.load();
        if shared.same_write(&pending.target) {
            log::debug!("coordinator: auto-reset of {}", shared.status());
            self.local = shared;
            self.advance(Event::AutoReset, OperationState::idle());
        } else {
            self.reconcile();
        }
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Apply `event` to the local record; `next` must be the status the
    /// transition table prescribes.
    fn advance(&mut self, event: Event, next: OperationState) -> bool {
        let from = self.local.status();
        if from.next(event) != Some(next.status()) {
            log::debug!("coordinator: {event:?} not valid in {from}, ignored");
            return false;
        }

        log::debug!("coordinator: {from} --{event:?}--> {}", next.status());
        self.persist(next);
        true
    }

    fn persist(&mut self, next: OperationState) {
        self.cancel_reset();
        if let Err(e) = self.store.save(&next) {
            log::error!("coordinator: failed to persist {}: {e}", next.status());
        }
        self.local = next;
        self.publish();
        self.wake.post(STATE_CHANGED);

        if self.local.status().is_terminal() {
            self.schedule_reset();
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.local.clone());
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

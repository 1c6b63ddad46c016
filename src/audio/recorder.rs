//! The [`Recorder`] seam and the microphone-backed [`MicRecorder`].
//!
//! ```text
//! start() ──▶ spawn "audio-capture" thread
//!               ├─ AudioCapture::open + start   (result reported back)
//!               └─ loop: AudioChunk → stereo_to_mono → samples
//! stop()  ──▶ signal thread, join, encode_wav(samples)
//! ```

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

use super::capture::{AudioCapture, AudioChunk};
use super::wav::{encode_wav, stereo_to_mono};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("{0}")]
    DeviceUnavailable(String),
}

/// Produces one WAV recording per `start` / `stop` pair.
pub trait Recorder: Send {
    fn start(&mut self) -> Result<(), RecorderError>;

    /// Finish the current recording. `None` when nothing was captured or no
    /// recording was in progress.
    fn stop(&mut self) -> Option<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// MicRecorder
// ---------------------------------------------------------------------------

const CHUNK_POLL: Duration = Duration::from_millis(20);

struct Captured {
    samples: Vec<f32>,
    sample_rate: u32,
}

struct ActiveCapture {
    stop_tx: mpsc::Sender<()>,
    worker: JoinHandle<Captured>,
}

/// Records from a cpal input device on a dedicated thread.
pub struct MicRecorder {
    device: Option<String>,
    max_secs: f32,
    active: Option<ActiveCapture>,
}

impl MicRecorder {
    pub fn new(device: Option<String>, max_secs: f32) -> Self {
        Self {
            device,
            max_secs,
            active: None,
        }
    }
}

impl Recorder for MicRecorder {
    fn start(&mut self) -> Result<(), RecorderError> {
        if self.active.is_some() {
            log::debug!("audio: start ignored, already recording");
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let device = self.device.clone();
        let max_secs = self.max_secs;

        let worker = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || capture_until_stopped(device, max_secs, ready_tx, stop_rx))
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.active = Some(ActiveCapture { stop_tx, worker });
                log::info!("audio: recording started");
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = worker.join();
                Err(RecorderError::DeviceUnavailable(message))
            }
            Err(_) => {
                let _ = worker.join();
                Err(RecorderError::DeviceUnavailable(
                    "capture thread exited unexpectedly".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Option<Vec<u8>> {
        let active = self.active.take()?;
        let _ = active.stop_tx.send(());

        let captured = match active.worker.join() {
            Ok(captured) => captured,
            Err(_) => {
                log::error!("audio: capture thread panicked");
                return None;
            }
        };

        if captured.samples.is_empty() {
            log::warn!("audio: recording stopped with no samples");
            return None;
        }

        log::info!(
            "audio: recording stopped, {:.1}s captured",
            captured.samples.len() as f32 / captured.sample_rate.max(1) as f32
        );

        match encode_wav(&captured.samples, captured.sample_rate) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("audio: WAV encoding failed: {e}");
                None
            }
        }
    }
}

fn capture_until_stopped(
    device: Option<String>,
    max_secs: f32,
    ready_tx: mpsc::Sender<Result<(), String>>,
    stop_rx: mpsc::Receiver<()>,
) -> Captured {
    let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>();

    let started = AudioCapture::open(device.as_deref())
        .and_then(|capture| Ok((capture.start(chunk_tx)?, capture.sample_rate())));
    let (handle, sample_rate) = match started {
        Ok(started) => started,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return Captured {
                samples: Vec::new(),
                sample_rate: 0,
            };
        }
    };
    let _ = ready_tx.send(Ok(()));

    let limit = (max_secs.max(0.0) * sample_rate as f32) as usize;
    let mut samples = Vec::new();
    let mut push = |chunk: AudioChunk| {
        let mono = stereo_to_mono(&chunk.samples, chunk.channels);
        let room = limit.saturating_sub(samples.len());
        samples.extend_from_slice(&mono[..mono.len().min(room)]);
    };

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }
        match chunk_rx.recv_timeout(CHUNK_POLL) {
            Ok(chunk) => push(chunk),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(handle);
    while let Ok(chunk) = chunk_rx.try_recv() {
        push(chunk);
    }

    Captured {
        samples,
        sample_rate,
    }
}

// ---------------------------------------------------------------------------
// MockRecorder  (test-only)
// ---------------------------------------------------------------------------

/// Scripted recorder: fails to start, or yields fixed bytes (or nothing).
#[cfg(test)]
#[derive(Clone)]
pub struct MockRecorder {
    start_error: Option<String>,
    audio: Option<Vec<u8>>,
    starts: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    recording: bool,
}

#[cfg(test)]
impl MockRecorder {
    pub fn with_audio(audio: &[u8]) -> Self {
        Self {
            start_error: None,
            audio: Some(audio.to_vec()),
            starts: Default::default(),
            recording: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            audio: None,
            ..Self::with_audio(&[])
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            start_error: Some(message.to_string()),
            ..Self::silent()
        }
    }

    /// Number of successful `start` calls across all clones.
    pub fn starts(&self) -> usize {
        self.starts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Recorder for MockRecorder {
    fn start(&mut self) -> Result<(), RecorderError> {
        if let Some(message) = &self.start_error {
            return Err(RecorderError::DeviceUnavailable(message.clone()));
        }
        self.recording = true;
        self.starts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Option<Vec<u8>> {
        if !std::mem::take(&mut self.recording) {
            return None;
        }
        self.audio.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_start_is_none() {
        let mut recorder = MicRecorder::new(None, 10.0);
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn mock_recorder_scripts() {
        let mut ok = MockRecorder::with_audio(b"wav");
        ok.start().unwrap();
        assert_eq!(ok.stop().as_deref(), Some(&b"wav"[..]));
        assert_eq!(ok.stop(), None);
        assert_eq!(ok.starts(), 1);

        let mut silent = MockRecorder::silent();
        silent.start().unwrap();
        assert_eq!(silent.stop(), None);

        let mut broken = MockRecorder::unavailable("no microphone");
        assert_eq!(
            broken.start(),
            Err(RecorderError::DeviceUnavailable("no microphone".into()))
        );
    }

    #[test]
    fn recorder_is_object_safe_and_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<Box<dyn Recorder>>();
        let _boxed: Box<dyn Recorder> = Box::new(MicRecorder::new(None, 1.0));
    }
}

//! Input-device access through `cpal`.
//!
//! ```text
//! AudioCapture::open(name) ── pick device, read its default input config
//!        │
//!        ▼
//! AudioCapture::start(tx) ── cpal callback ──▶ AudioChunk (f32) ──▶ tx
//!        │
//!        ▼
//!   StreamHandle  (drop = stream stops)
//! ```
//!
//! Devices whose native format is `i16` or `u16` are converted to `f32` in the
//! callback, so consumers only ever see `[-1.0, 1.0]` samples.
//!
//! `cpal::Stream` is not `Send` on every platform; keep the handle on the
//! thread that created it (see [`crate::audio::MicRecorder`]).

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use thiserror::Error;

/// One callback's worth of interleaved samples.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Keeps the input stream running until dropped.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no default input device")]
    NoDevice,

    #[error("input device `{0}` not found")]
    DeviceNotFound(String),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("could not list input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("could not read input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("could not open input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("could not start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    format: SampleFormat,
}

impl AudioCapture {
    /// Open the input device called `name`, or the host default for `None`.
    pub fn open(name: Option<&str>) -> Result<Self, CaptureError> {
        let device = select_device(&cpal::default_host(), name)?;
        let supported = device.default_input_config()?;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::debug!(
            "audio: input `{}` at {} Hz, {} ch, {format:?}",
            device.name().unwrap_or_else(|_| "?".into()),
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device,
            config,
            format,
        })
    }

    /// Begin streaming chunks to `tx`. A dropped receiver is ignored.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let stream = match self.format {
            SampleFormat::F32 => self.build::<f32>(tx)?,
            SampleFormat::I16 => self.build::<i16>(tx)?,
            SampleFormat::U16 => self.build::<u16>(tx)?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    fn build<T>(&self, tx: mpsc::Sender<AudioChunk>) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let sample_rate = self.sample_rate();
        let channels = self.channels();

        self.device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(AudioChunk {
                    samples: data.iter().map(|s| s.to_sample::<f32>()).collect(),
                    sample_rate,
                    channels,
                });
            },
            |err| log::error!("audio: stream error: {err}"),
            None,
        )
    }
}

fn select_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let Some(wanted) = name else {
        return host.default_input_device().ok_or(CaptureError::NoDevice);
    };

    host.input_devices()?
        .find(|device| device.name().is_ok_and(|n| n == wanted))
        .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))
}

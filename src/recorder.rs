//! Shared audio capture pipeline
//!
//! One capture stream feeds the whole process. Captured frames are handed
//! to at most one registered [`AudioProcessor`] at a time: the clap trigger
//! while the system is idle, the recognizer while an utterance is being
//! captured.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz mono for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Consumer of live capture frames.
///
/// Called on the capture thread with 16kHz mono PCM chunks of arbitrary
/// length. Implementations must not block for long; the capture stream
/// drops nothing and a slow processor backs up the audio callback.
pub trait AudioProcessor: Send + Sync {
    /// Receive one chunk of captured frames
    fn process(&self, frames: &[i16]);
}

/// Distributes captured frames to the currently registered processor.
///
/// Holds a single processor slot. Registration fails while the slot is
/// occupied, which is what enforces the one-capture-consumer invariant.
#[derive(Default)]
pub struct AudioRecorder {
    processor: Mutex<Option<Arc<dyn AudioProcessor>>>,
}

impl AudioRecorder {
    /// Create a recorder with an empty processor slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` as the active frame consumer.
    ///
    /// # Errors
    ///
    /// Returns an audio error if another processor is already registered.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub fn add_processor(&self, processor: Arc<dyn AudioProcessor>) -> Result<()> {
        let mut slot = self.processor.lock().unwrap();
        if slot.is_some() {
            return Err(Error::Audio("capture slot already in use".to_string()));
        }
        *slot = Some(processor);
        Ok(())
    }

    /// Release the slot if `processor` is the one registered.
    ///
    /// Identity is by address, so the caller must pass the same processor
    /// it registered. Removing an unregistered processor is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub fn remove_processor(&self, processor: &dyn AudioProcessor) {
        let mut slot = self.processor.lock().unwrap();
        if let Some(current) = slot.as_ref() {
            if std::ptr::addr_eq(Arc::as_ptr(current), std::ptr::from_ref(processor)) {
                *slot = None;
            }
        }
    }

    /// Whether a processor is currently registered
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    #[must_use]
    pub fn has_processor(&self) -> bool {
        self.processor.lock().unwrap().is_some()
    }

    /// Distribute one chunk of frames to the registered processor.
    ///
    /// This is the capture-callback entry point; tests use it to inject
    /// synthetic audio. The slot lock is not held across the processor
    /// call, so a processor may deregister itself (or register a
    /// successor) from inside `process`.
    ///
    /// # Panics
    ///
    /// Panics if the slot lock is poisoned.
    pub fn feed(&self, frames: &[i16]) {
        let processor = self.processor.lock().unwrap().clone();
        if let Some(processor) = processor {
            processor.process(frames);
        }
    }
}

/// Owns the cpal input stream feeding an [`AudioRecorder`].
///
/// The stream handle is not `Send`, so the capture stream lives on the
/// thread that opened it (normally the main thread) while the recorder it
/// feeds is shared freely. Dropping the stream stops capture, giving
/// scoped acquisition around the coordinator's active lifetime.
pub struct CaptureStream {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    recorder: Arc<AudioRecorder>,
    stream: Option<Stream>,
}

impl CaptureStream {
    /// Open the default input device for 16kHz mono capture
    ///
    /// # Errors
    ///
    /// Returns an error if no input device or suitable configuration is
    /// available.
    pub fn new(recorder: Arc<AudioRecorder>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable capture config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "capture stream initialized"
        );

        Ok(Self {
            device,
            config,
            recorder,
            stream: None,
        })
    }

    /// Start capturing and feeding the recorder
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be built or started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let recorder = Arc::clone(&self.recorder);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    #[allow(clippy::cast_possible_truncation)]
                    let frames: Vec<i16> = data
                        .iter()
                        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
                        .collect();
                    recorder.feed(&frames);
                },
                |err| {
                    tracing::error!(error = %err, "capture stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("capture started");
        Ok(())
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("capture stopped");
        }
    }

    /// Whether the stream is currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

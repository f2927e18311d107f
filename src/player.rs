//! Audio playback
//!
//! Plays trigger/apology clips from disk and raw PCM response audio from
//! the recognizer. Playback blocks for its duration; the coordinator
//! relies on that to keep at most one utterance in flight.

use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Plays audio for user feedback and recognizer responses
pub trait Player: Send + Sync {
    /// Play a WAV clip from disk, blocking until playback completes
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be read or played.
    fn play_clip(&self, path: &Path) -> Result<()>;

    /// Play raw little-endian PCM, blocking until playback completes
    ///
    /// # Errors
    ///
    /// Returns an error if the format is unsupported or playback fails.
    fn play_bytes(&self, bytes: &[u8], sample_width: u16, sample_rate_hz: u32) -> Result<()>;
}

/// Plays audio through the default cpal output device
pub struct CpalPlayer;

impl CpalPlayer {
    /// Create a player, verifying an output device is present
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self)
    }

    /// Play mono f32 samples at the given rate, blocking until done
    fn play_samples(samples: Vec<f32>, sample_rate_hz: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate_hz)
                    && c.max_sample_rate() >= SampleRate(sample_rate_hz)
            })
            .or_else(|| {
                // Fallback: stereo output with the mono signal on all channels
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(sample_rate_hz)
                        && c.max_sample_rate() >= SampleRate(sample_rate_hz)
                })
            })
            .ok_or_else(|| {
                Error::Playback(format!("no output config for {sample_rate_hz} Hz"))
            })?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(sample_rate_hz))
            .config();
        let channels = config.channels as usize;

        let sample_count = samples.len();
        let done = Arc::new((Mutex::new(false), Condvar::new()));

        let stream = {
            let done = Arc::clone(&done);
            let mut position = 0usize;
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let sample = if position < samples.len() {
                                let s = samples[position];
                                position += 1;
                                s
                            } else {
                                let (finished, cond) = &*done;
                                *finished.lock().unwrap() = true;
                                cond.notify_all();
                                0.0
                            };
                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "playback stream error");
                    },
                    None,
                )
                .map_err(|e| Error::Playback(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        // Wait for the callback to run out of samples, with a timeout
        // derived from the clip length in case the device stalls.
        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate_hz);
        let timeout = Duration::from_millis(duration_ms + 500);

        let (finished, cond) = &*done;
        let guard = finished.lock().unwrap();
        let (_guard, wait_result) = cond
            .wait_timeout_while(guard, timeout, |finished| !*finished)
            .unwrap();
        if wait_result.timed_out() {
            tracing::warn!(samples = sample_count, "playback did not drain in time");
        }

        // Let the device flush its last buffer.
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

impl Player for CpalPlayer {
    fn play_clip(&self, path: &Path) -> Result<()> {
        let mut reader =
            hound::WavReader::open(path).map_err(|e| Error::Playback(e.to_string()))?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(Error::Playback(format!(
                "unsupported wav format in {}: expected 16-bit int samples",
                path.display()
            )));
        }

        let samples = match spec.channels {
            1 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Playback(e.to_string()))?,
            2 => {
                // Downmix stereo clips by averaging channels
                let raw = reader
                    .samples::<i16>()
                    .collect::<std::result::Result<Vec<i16>, _>>()
                    .map_err(|e| Error::Playback(e.to_string()))?;
                raw.chunks(2)
                    .map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    })
                    .collect()
            }
            other => {
                return Err(Error::Playback(format!(
                    "unsupported channel count {other} in {}",
                    path.display()
                )));
            }
        };

        tracing::debug!(clip = %path.display(), samples = samples.len(), "playing clip");
        Self::play_samples(samples, spec.sample_rate)
    }

    fn play_bytes(&self, bytes: &[u8], sample_width: u16, sample_rate_hz: u32) -> Result<()> {
        if sample_width != 2 {
            return Err(Error::Playback(format!(
                "unsupported sample width {sample_width}, only 16-bit audio is supported"
            )));
        }

        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
            .collect();

        Self::play_samples(samples, sample_rate_hz)
    }
}

//! HTTP-backed speech recognizer
//!
//! Accumulates utterance audio from the shared recorder, detects the end
//! of the utterance with an energy endpointer, and posts the audio to a
//! Whisper-style transcription endpoint.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::actor::CommandActor;
use crate::config::SttConfig;
use crate::recorder::{AudioProcessor, SAMPLE_RATE};
use crate::{Error, Result};

use super::{RecognitionResult, SpeechRecognizer, UtteranceEndCallback};

/// Minimum normalized RMS energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum amount of speech before an utterance can end (0.3s)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends the utterance (0.5s)
const SILENCE_SAMPLES: usize = 8000;

/// Hard cap on utterance length (15s); a stuck endpointer must not
/// block the worker forever
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 15;

/// Response from a Whisper-style transcription endpoint
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

struct CaptureState {
    samples: Vec<i16>,
    speech_samples: usize,
    silence_samples: usize,
    collecting: bool,
    complete: bool,
    session_open: bool,
}

impl CaptureState {
    const fn new() -> Self {
        Self {
            samples: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
            collecting: false,
            complete: false,
            session_open: true,
        }
    }
}

/// Frame sink registered with the recorder while listening.
///
/// Runs the endpointer on the capture thread and wakes the blocked
/// `recognize` call when the utterance ends.
struct UtteranceCapture {
    state: Mutex<CaptureState>,
    done: Condvar,
    utterance_end: Mutex<Option<UtteranceEndCallback>>,
}

impl UtteranceCapture {
    fn new() -> Self {
        Self {
            state: Mutex::new(CaptureState::new()),
            done: Condvar::new(),
            utterance_end: Mutex::new(None),
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.samples.clear();
        state.speech_samples = 0;
        state.silence_samples = 0;
        state.collecting = true;
        state.complete = false;
    }

    fn end_session(&self) {
        let mut state = self.state.lock().unwrap();
        state.session_open = false;
        state.collecting = false;
        drop(state);
        self.done.notify_all();
    }

    /// Block until the current utterance completes; returns its samples,
    /// or `None` if the session was ended first.
    fn wait_for_utterance(&self) -> Option<Vec<i16>> {
        let mut state = self.state.lock().unwrap();
        while !state.complete && state.session_open {
            state = self.done.wait(state).unwrap();
        }
        if !state.session_open {
            return None;
        }
        state.complete = false;
        Some(std::mem::take(&mut state.samples))
    }
}

impl AudioProcessor for UtteranceCapture {
    fn process(&self, frames: &[i16]) {
        let ended = {
            let mut state = self.state.lock().unwrap();
            if !state.collecting {
                return;
            }

            state.samples.extend_from_slice(frames);

            if rms_energy(frames) > ENERGY_THRESHOLD {
                state.speech_samples += frames.len();
                state.silence_samples = 0;
            } else {
                state.silence_samples += frames.len();
            }

            let utterance_done = (state.speech_samples >= MIN_SPEECH_SAMPLES
                && state.silence_samples >= SILENCE_SAMPLES)
                || state.samples.len() >= MAX_UTTERANCE_SAMPLES;

            if utterance_done {
                state.collecting = false;
                state.complete = true;
                tracing::debug!(
                    samples = state.samples.len(),
                    speech = state.speech_samples,
                    "utterance complete"
                );
            }
            utterance_done
        };

        if ended {
            self.done.notify_all();
            if let Some(callback) = &*self.utterance_end.lock().unwrap() {
                callback();
            }
        }
    }
}

/// Recognizes speech by posting utterance audio to a transcription
/// endpoint
pub struct CloudRecognizer {
    // Built lazily on the worker thread; a blocking client must not be
    // constructed inside an async runtime.
    client: OnceLock<reqwest::blocking::Client>,
    endpoint: String,
    api_key: String,
    model: String,
    language: Option<String>,
    capture: Arc<UtteranceCapture>,
    phrases: Mutex<Vec<String>>,
    audio_logging: AtomicBool,
}

impl CloudRecognizer {
    /// Create a recognizer for the configured transcription endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key is missing.
    pub fn new(config: &SttConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Config(
                "transcription API key required (set OPENAI_API_KEY or stt.api_key)".to_string(),
            ));
        }

        Ok(Self {
            client: OnceLock::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            capture: Arc::new(UtteranceCapture::new()),
            phrases: Mutex::new(Vec::new()),
            audio_logging: AtomicBool::new(false),
        })
    }

    fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let mut form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Recognizer(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let phrases = self.phrases.lock().unwrap();
        if !phrases.is_empty() {
            form = form.text("prompt", phrases.join(", "));
        }
        drop(phrases);

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .get_or_init(reqwest::blocking::Client::new)
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription endpoint error");
            return Err(Error::Recognizer(format!(
                "transcription endpoint returned {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response.json()?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn log_utterance(samples: &[i16]) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = std::env::temp_dir().join(format!("hark-utterance-{millis}.wav"));

        match encode_wav(samples) {
            Ok(wav) => {
                if let Err(e) = std::fs::write(&path, wav) {
                    tracing::warn!(path = %path.display(), error = %e, "audio log write failed");
                } else {
                    tracing::debug!(path = %path.display(), "utterance audio logged");
                }
            }
            Err(e) => tracing::warn!(error = %e, "audio log encode failed"),
        }
    }
}

impl SpeechRecognizer for CloudRecognizer {
    fn set_utterance_end_callback(&self, callback: UtteranceEndCallback) {
        *self.capture.utterance_end.lock().unwrap() = Some(callback);
    }

    fn processor(&self) -> Arc<dyn AudioProcessor> {
        Arc::clone(&self.capture) as Arc<dyn AudioProcessor>
    }

    fn reset(&self) {
        self.capture.reset();
    }

    fn recognize(&self) -> Result<RecognitionResult> {
        let Some(samples) = self.capture.wait_for_utterance() else {
            // Session ended during shutdown; report an empty cycle.
            return Ok(RecognitionResult::default());
        };

        if samples.len() < MIN_SPEECH_SAMPLES {
            tracing::debug!(samples = samples.len(), "utterance too short, skipping");
            return Ok(RecognitionResult::default());
        }

        if self.audio_logging.load(Ordering::Relaxed) {
            Self::log_utterance(&samples);
        }

        let wav = encode_wav(&samples)?;
        let transcript = self.transcribe(wav)?;

        Ok(RecognitionResult {
            transcript: Some(transcript.trim().to_string()).filter(|t| !t.is_empty()),
            response_audio: None,
            dialog_follow_on: false,
        })
    }

    fn end_audio_session(&self) {
        self.capture.end_session();
    }

    fn add_phrases(&self, actor: &dyn CommandActor) {
        let phrases = actor.phrases();
        tracing::debug!(count = phrases.len(), "recognition phrases registered");
        *self.phrases.lock().unwrap() = phrases;
    }

    fn set_audio_logging_enabled(&self, enabled: bool) {
        self.audio_logging.store(enabled, Ordering::Relaxed);
    }
}

/// Normalized RMS energy of one chunk, in `[0, 1]`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn rms_energy(frames: &[i16]) -> f32 {
    if frames.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = frames.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    ((sum_squares / frames.len() as f64).sqrt() / 32768.0) as f32
}

/// Encode mono 16kHz samples as WAV bytes for the transcription endpoint
fn encode_wav(samples: &[i16]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Recognizer(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Recognizer(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::Recognizer(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

//! Speech recognition
//!
//! The coordinator consumes recognizers through the [`SpeechRecognizer`]
//! contract; [`CloudRecognizer`] is the shipped HTTP-backed
//! implementation.

mod cloud;

pub use cloud::CloudRecognizer;

use std::sync::Arc;

use crate::actor::CommandActor;
use crate::recorder::AudioProcessor;
use crate::Result;

/// Sample width of response audio, in bytes
pub const RESPONSE_SAMPLE_WIDTH: u16 = 2;

/// Sample rate of response audio
pub const RESPONSE_SAMPLE_RATE_HZ: u32 = 16_000;

/// Outcome of one recognition cycle
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    /// Recognized text, if any
    pub transcript: Option<String>,

    /// Synthesized response as raw 16-bit little-endian PCM at
    /// [`RESPONSE_SAMPLE_RATE_HZ`]
    pub response_audio: Option<Vec<u8>>,

    /// The recognizer requests another turn without a new trigger
    pub dialog_follow_on: bool,
}

/// Notification that audio capture for the current utterance has ended.
///
/// May be invoked from any thread the recognizer uses internally.
pub type UtteranceEndCallback = Box<dyn Fn() + Send + Sync>;

/// A speech recognition backend.
///
/// One recognition cycle is: `reset`, register [`processor`](Self::processor)
/// with the recorder, then a blocking [`recognize`](Self::recognize) call
/// that returns once the utterance has been processed. The recognizer
/// signals end of capture through the utterance-end callback before
/// `recognize` returns.
pub trait SpeechRecognizer: Send + Sync {
    /// Install the end-of-utterance notification
    fn set_utterance_end_callback(&self, callback: UtteranceEndCallback);

    /// The frame sink to register with the recorder while listening.
    ///
    /// Must return the same underlying processor on every call; the
    /// coordinator deregisters by identity.
    fn processor(&self) -> Arc<dyn AudioProcessor>;

    /// Discard any partially captured utterance and start a new one
    fn reset(&self);

    /// Perform one blocking recognition
    ///
    /// # Errors
    ///
    /// Returns an error if recognition fails; the coordinator recovers
    /// from it and continues the cycle.
    fn recognize(&self) -> Result<RecognitionResult>;

    /// End any open audio session, unblocking a pending `recognize`.
    /// Used on shutdown.
    fn end_audio_session(&self);

    /// Bias recognition toward the actor's command phrases
    fn add_phrases(&self, actor: &dyn CommandActor);

    /// Enable or disable dumping utterance audio for debugging
    fn set_audio_logging_enabled(&self, enabled: bool);
}

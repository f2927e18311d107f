//! Hark - voice interaction front end
//!
//! Waits for a trigger (touched file, clap, custom sensor), captures and
//! recognizes one utterance, and dispatches the result to a local
//! command actor or response playback, with live ready/listening/
//! thinking feedback.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  Trigger Sources                  │
//! │        pipe     │     clap     │     sensor       │
//! └────────────────────────┬──────────────────────────┘
//!                          │
//! ┌────────────────────────▼──────────────────────────┐
//! │                 Mic Coordinator                   │
//! │   activation signal │ worker │ status reporting   │
//! └──────┬──────────────────┬────────────────┬────────┘
//!        │                  │                │
//! ┌──────▼──────┐   ┌───────▼───────┐  ┌─────▼─────┐
//! │  Recorder   │   │  Recognizer   │  │   Actor   │
//! │ (capture)   │   │ (STT backend) │  │ (commands)│
//! └─────────────┘   └───────────────┘  └───────────┘
//! ```
//!
//! The coordinator is the only writer of status and of the recorder's
//! processor slot; triggers and the recognizer reach it through
//! callbacks.

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod player;
pub mod recognizer;
pub mod recorder;
pub mod signal;
pub mod status;
pub mod trigger;

pub use actor::{CommandActor, KeywordActor};
pub use config::{Config, SttConfig};
pub use coordinator::{CoordinatorOptions, MicCoordinator};
pub use error::{Error, Result};
pub use player::{CpalPlayer, Player};
pub use recognizer::{
    CloudRecognizer, RecognitionResult, SpeechRecognizer, UtteranceEndCallback,
    RESPONSE_SAMPLE_RATE_HZ, RESPONSE_SAMPLE_WIDTH,
};
pub use recorder::{AudioProcessor, AudioRecorder, CaptureStream, SAMPLE_RATE};
pub use signal::ActivationSignal;
pub use status::{Status, StatusReporter};
pub use trigger::{
    ClapTrigger, PipeTrigger, SensorHandle, SensorTrigger, TriggerCallback, TriggerKind,
    TriggerSource,
};

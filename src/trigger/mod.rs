//! Trigger sources
//!
//! A trigger detects an activation condition (a touched file, a clap, a
//! custom sensor) and invokes the registered callback. Debounce is not a
//! trigger concern; the coordinator's activation signal absorbs
//! duplicates.

mod clap_trigger;
mod pipe;
mod sensor;

pub use clap_trigger::ClapTrigger;
pub use pipe::PipeTrigger;
pub use sensor::{SensorHandle, SensorTrigger};

use std::sync::Arc;

use crate::config::Config;
use crate::recorder::AudioRecorder;
use crate::Result;

/// Invoked once per physical activation, from whatever thread the trigger
/// uses
pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of activation events
pub trait TriggerSource: Send + Sync {
    /// Register the activation callback
    fn set_callback(&self, callback: TriggerCallback);

    /// Arm the trigger. Called again after each recognition cycle to
    /// re-arm variants that disarm on firing; must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the trigger cannot be armed.
    fn start(&self) -> Result<()>;

    /// Disarm the trigger and release any resources it holds
    fn stop(&self);
}

/// Trigger variants selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Manual signal: fire when the trigger file appears
    Pipe,
    /// Audio threshold: fire on sustained loud input
    Clap,
}

/// Build the configured trigger variant
pub fn from_config(config: &Config, recorder: Arc<AudioRecorder>) -> Arc<dyn TriggerSource> {
    match config.trigger {
        TriggerKind::Pipe => Arc::new(PipeTrigger::new(config.trigger_pipe.clone())),
        TriggerKind::Clap => Arc::new(ClapTrigger::new(recorder)),
    }
}

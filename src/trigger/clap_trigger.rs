//! Audio-threshold trigger
//!
//! Listens on the shared recorder for sustained loud input (a clap, a
//! shout). While armed the detector occupies the recorder's processor
//! slot; it releases the slot before firing so the recognizer can take
//! it over for the utterance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::recorder::{AudioProcessor, AudioRecorder};
use crate::Result;

use super::{TriggerCallback, TriggerSource};

/// Doubled mean absolute amplitude above which a chunk counts as loud
const LOUD_THRESHOLD: i64 = 23_000;

/// Sustained loud input required to fire (0.25s at 16kHz)
const MIN_LOUD_SAMPLES: usize = 4000;

struct ClapDetector {
    recorder: Arc<AudioRecorder>,
    armed: AtomicBool,
    loud_samples: AtomicUsize,
    callback: Mutex<Option<TriggerCallback>>,
}

impl AudioProcessor for ClapDetector {
    fn process(&self, frames: &[i16]) {
        if !self.armed.load(Ordering::SeqCst) || frames.is_empty() {
            return;
        }

        let level = mean_abs(frames) * 2;
        let loud = if level > LOUD_THRESHOLD {
            self.loud_samples.fetch_add(frames.len(), Ordering::SeqCst) + frames.len()
        } else {
            self.loud_samples.store(0, Ordering::SeqCst);
            0
        };

        if loud >= MIN_LOUD_SAMPLES {
            self.armed.store(false, Ordering::SeqCst);
            self.loud_samples.store(0, Ordering::SeqCst);
            tracing::debug!(level, "loud input detected");

            // Free the capture slot before the callback claims it for
            // the recognizer.
            self.recorder.remove_processor(self);

            let callback = self.callback.lock().unwrap().clone();
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

/// Fires on sustained loud input from the shared recorder
pub struct ClapTrigger {
    detector: Arc<ClapDetector>,
}

impl ClapTrigger {
    /// Create a trigger listening on `recorder`
    #[must_use]
    pub fn new(recorder: Arc<AudioRecorder>) -> Self {
        Self {
            detector: Arc::new(ClapDetector {
                recorder,
                armed: AtomicBool::new(false),
                loud_samples: AtomicUsize::new(0),
                callback: Mutex::new(None),
            }),
        }
    }
}

impl TriggerSource for ClapTrigger {
    fn set_callback(&self, callback: TriggerCallback) {
        *self.detector.callback.lock().unwrap() = Some(callback);
    }

    fn start(&self) -> Result<()> {
        if self.detector.armed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.detector.loud_samples.store(0, Ordering::SeqCst);
        self.detector
            .recorder
            .add_processor(Arc::clone(&self.detector) as Arc<dyn AudioProcessor>)?;
        tracing::debug!("clap trigger armed");
        Ok(())
    }

    fn stop(&self) {
        self.detector.armed.store(false, Ordering::SeqCst);
        self.detector.recorder.remove_processor(self.detector.as_ref());
    }
}

#[allow(clippy::cast_possible_wrap)]
fn mean_abs(frames: &[i16]) -> i64 {
    let sum: i64 = frames.iter().map(|&s| i64::from(s).abs()).sum();
    sum / frames.len() as i64
}

//! Mic coordinator - the trigger-to-recognition-to-response loop
//!
//! Owns the status state machine, the background recognition worker,
//! duplicate-trigger suppression and result dispatch. Three concurrency
//! domains meet here: the trigger's thread raises the activation signal,
//! the recognizer's capture thread delivers the end-of-utterance
//! notification, and the dedicated worker thread performs the blocking
//! recognition and dispatch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::actor::CommandActor;
use crate::player::Player;
use crate::recognizer::{
    RecognitionResult, SpeechRecognizer, RESPONSE_SAMPLE_RATE_HZ, RESPONSE_SAMPLE_WIDTH,
};
use crate::recorder::AudioRecorder;
use crate::signal::ActivationSignal;
use crate::status::{Status, StatusReporter};
use crate::trigger::TriggerSource;
use crate::Result;

/// Coordinator behavior switches
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Play response audio even for locally handled commands
    pub always_respond: bool,

    /// Clip played when a recognition cycle fails
    pub apology_sound: Option<PathBuf>,
}

/// Detects triggers and runs recognition in a background worker.
///
/// [`start`](Self::start) launches the worker and arms the trigger;
/// [`stop`](Self::stop) (also run on drop) tears both down on every exit
/// path.
pub struct MicCoordinator {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

struct Inner {
    actor: Arc<dyn CommandActor>,
    recognizer: Arc<dyn SpeechRecognizer>,
    recorder: Arc<AudioRecorder>,
    player: Arc<dyn Player>,
    trigger: Arc<dyn TriggerSource>,
    status: StatusReporter,
    signal: ActivationSignal,
    running: AtomicBool,
    options: CoordinatorOptions,
}

impl MicCoordinator {
    /// Start the coordinator: launch the worker, arm the trigger, report
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned or the
    /// trigger cannot be armed; in both cases everything already started
    /// is torn down before returning.
    pub fn start(
        actor: Arc<dyn CommandActor>,
        recognizer: Arc<dyn SpeechRecognizer>,
        recorder: Arc<AudioRecorder>,
        player: Arc<dyn Player>,
        trigger: Arc<dyn TriggerSource>,
        status: StatusReporter,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        let inner = Arc::new(Inner {
            actor,
            recognizer,
            recorder,
            player,
            trigger,
            status,
            signal: ActivationSignal::new(),
            running: AtomicBool::new(true),
            options,
        });

        inner.recognizer.add_phrases(inner.actor.as_ref());

        // Callbacks hold weak references so the coordinator's collaborators
        // do not keep its state alive after teardown.
        let weak = Arc::downgrade(&inner);
        inner
            .recognizer
            .set_utterance_end_callback(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.utterance_ended();
                }
            }));

        let weak = Arc::downgrade(&inner);
        inner.trigger.set_callback(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.recognize();
            }
        }));

        let worker = {
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("hark-recognizer".to_string())
                .spawn(move || inner.worker_loop())?
        };

        if let Err(e) = inner.trigger.start() {
            inner.running.store(false, Ordering::SeqCst);
            inner.signal.raise();
            if worker.join().is_err() {
                tracing::error!("recognizer worker panicked during teardown");
            }
            return Err(e);
        }

        inner.status.report(Status::Ready);

        Ok(Self {
            inner,
            worker: Some(worker),
        })
    }

    /// Stop the coordinator and join the worker. Idempotent.
    pub fn stop(&mut self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        tracing::debug!("stopping coordinator");
        self.inner.signal.raise();
        self.inner.recognizer.end_audio_session();
        self.inner.trigger.stop();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("recognizer worker panicked");
            }
        }
    }
}

impl Drop for MicCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    /// Trigger entry point: ready -> listening.
    ///
    /// Runs on the trigger's thread (or the worker's, for follow-on
    /// turns). The listening report, recognizer reset and processor
    /// registration happen atomically with the signal raise, so the
    /// worker can neither miss the cycle nor observe it half-prepared.
    fn recognize(&self) {
        let raised = self.signal.raise_after(|| {
            self.status.report(Status::Listening);
            self.recognizer.reset();
            if let Err(e) = self.recorder.add_processor(self.recognizer.processor()) {
                tracing::error!(error = %e, "capture slot unavailable for recognizer");
            }
        });

        if !raised {
            // Duplicate trigger (eg multiple button presses): no state
            // change, no report.
            tracing::debug!("duplicate trigger ignored");
        }
    }

    /// Recognizer notification: listening -> thinking.
    ///
    /// Arrives on whatever thread the recognizer uses; only reflects
    /// that capture for this utterance has ended.
    fn utterance_ended(&self) {
        self.recorder
            .remove_processor(self.recognizer.processor().as_ref());
        self.status.report(Status::Thinking);
    }

    fn worker_loop(&self) {
        loop {
            self.signal.wait_raised();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tracing::info!("recognizing");
            let outcome = self.recognizer.recognize();

            // Shutdown may have raced the blocking recognition; exit
            // without re-arming the trigger or reporting ready.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let follow_on = match outcome {
                Ok(result) => {
                    let follow_on = result.dialog_follow_on;
                    self.dispatch(&result);
                    follow_on
                }
                Err(e) => {
                    tracing::error!(error = %e, "recognition failed");
                    self.apologize();
                    false
                }
            };

            self.signal.clear();

            if follow_on {
                self.recognize();
            } else {
                if let Err(e) = self.trigger.start() {
                    tracing::error!(error = %e, "failed to re-arm trigger");
                }
                self.status.report(Status::Ready);
            }
        }

        tracing::debug!("recognizer worker stopped");
    }

    /// Deterministic result dispatch, in priority order: handled local
    /// command, response playback, unhandled transcript, empty cycle.
    fn dispatch(&self, result: &RecognitionResult) {
        if let Some(transcript) = &result.transcript {
            if self.actor.handle(transcript) {
                tracing::info!(command = %transcript, "handled local command");
                if self.options.always_respond {
                    if let Some(audio) = &result.response_audio {
                        self.play_response(audio);
                    }
                }
            } else {
                tracing::warn!(command = %transcript, "command was not handled");
            }
            return;
        }

        if let Some(audio) = &result.response_audio {
            self.play_response(audio);
            return;
        }

        tracing::warn!("no command recognized");
    }

    fn play_response(&self, audio: &[u8]) {
        #[allow(clippy::cast_precision_loss)]
        let seconds = audio.len() as f64
            / f64::from(u32::from(RESPONSE_SAMPLE_WIDTH) * RESPONSE_SAMPLE_RATE_HZ);
        tracing::info!(seconds, "playing response audio");

        if let Err(e) = self
            .player
            .play_bytes(audio, RESPONSE_SAMPLE_WIDTH, RESPONSE_SAMPLE_RATE_HZ)
        {
            tracing::error!(error = %e, "response playback failed");
        }
    }

    fn apologize(&self) {
        if let Some(clip) = &self.options.apology_sound {
            if let Err(e) = self.player.play_clip(clip) {
                tracing::warn!(clip = %clip.display(), error = %e, "apology playback failed");
            }
        }
    }
}

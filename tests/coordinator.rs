//! Coordinator integration tests
//!
//! Exercise the full trigger-to-dispatch loop with scripted fakes; no
//! audio hardware or network is involved. Status transitions are
//! observed through a real status pipe backed by a temp file.

use std::path::PathBuf;
use std::sync::Arc;

use hark::{
    AudioRecorder, CoordinatorOptions, Error, MicCoordinator, Player, RecognitionResult,
    StatusReporter,
};

mod common;
use common::{wait_until, FakeActor, FakePlayer, FakeRecognizer, FakeTrigger};

struct Harness {
    coordinator: MicCoordinator,
    trigger: Arc<FakeTrigger>,
    recognizer: Arc<FakeRecognizer>,
    player: Arc<FakePlayer>,
    actor: Arc<FakeActor>,
    recorder: Arc<AudioRecorder>,
    status_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn start(handled: &[&str], options: CoordinatorOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status");
        std::fs::File::create(&status_path).unwrap();

        let trigger = FakeTrigger::new();
        let recognizer = FakeRecognizer::new();
        let player = FakePlayer::new();
        let actor = FakeActor::handling(handled.iter().copied());
        let recorder = Arc::new(AudioRecorder::new());

        let status = StatusReporter::new(
            Arc::clone(&player) as Arc<dyn Player>,
            Some(status_path.clone()),
            None,
        );

        let coordinator = MicCoordinator::start(
            actor.clone(),
            recognizer.clone(),
            recorder.clone(),
            player.clone(),
            trigger.clone(),
            status,
            options,
        )
        .unwrap();

        Self {
            coordinator,
            trigger,
            recognizer,
            player,
            actor,
            recorder,
            status_path,
            _dir: dir,
        }
    }

    fn statuses(&self) -> Vec<String> {
        std::fs::read_to_string(&self.status_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn ready_reports(&self) -> usize {
        self.statuses().iter().filter(|s| *s == "ready").count()
    }

    /// Drive one full cycle: fire the trigger, end the utterance, hand
    /// the worker its result, and wait for the return to ready.
    fn run_cycle(&self, result: hark::Result<RecognitionResult>) {
        let calls_before = self.recognizer.recognize_calls();
        let ready_before = self.ready_reports();

        self.trigger.fire();
        assert!(
            wait_until(|| self.recognizer.recognize_calls() == calls_before + 1),
            "worker never picked up the cycle"
        );

        self.recognizer.finish_utterance();
        self.recognizer.push_result(result);

        assert!(
            wait_until(|| self.ready_reports() == ready_before + 1),
            "cycle never returned to ready"
        );
    }
}

fn transcript(text: &str) -> RecognitionResult {
    RecognitionResult {
        transcript: Some(text.to_string()),
        ..RecognitionResult::default()
    }
}

#[test]
fn single_cycle_status_ordering() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.run_cycle(Ok(transcript("gibberish")));

    assert_eq!(h.statuses(), ["ready", "listening", "thinking", "ready"]);
    h.coordinator.stop();
}

#[test]
fn duplicate_trigger_is_suppressed() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.trigger.fire();
    assert!(wait_until(|| h.recognizer.recognize_calls() == 1));

    // Second press while the cycle is in flight: no report, no reset,
    // no extra worker cycle.
    h.trigger.fire();
    h.trigger.fire();

    h.recognizer.finish_utterance();
    h.recognizer.push_result(Ok(RecognitionResult::default()));
    assert!(wait_until(|| h.ready_reports() == 2));

    assert_eq!(h.recognizer.recognize_calls(), 1);
    assert_eq!(h.recognizer.resets(), 1);
    assert_eq!(h.statuses(), ["ready", "listening", "thinking", "ready"]);
    h.coordinator.stop();
}

#[test]
fn burst_of_triggers_yields_one_cycle_in_flight() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    for _ in 0..8 {
        h.trigger.fire();
    }
    assert!(wait_until(|| h.recognizer.recognize_calls() == 1));

    h.recognizer.finish_utterance();
    h.recognizer.push_result(Ok(RecognitionResult::default()));
    assert!(wait_until(|| h.ready_reports() == 2));

    // All overlapping activations coalesced into a single cycle; a
    // fresh trigger afterwards starts a fresh one.
    assert_eq!(h.recognizer.recognize_calls(), 1);

    h.run_cycle(Ok(RecognitionResult::default()));
    assert_eq!(h.recognizer.recognize_calls(), 2);
    h.coordinator.stop();
}

#[test]
fn handled_command_logs_without_playback() {
    let mut h = Harness::start(&["turn on light"], CoordinatorOptions::default());

    h.run_cycle(Ok(transcript("turn on light")));

    assert_eq!(h.actor.handled(), ["turn on light"]);
    assert!(h.player.played_bytes().is_empty());
    h.coordinator.stop();
}

#[test]
fn response_audio_plays_when_no_transcript() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    let audio = vec![1_u8, 2, 3, 4];
    h.run_cycle(Ok(RecognitionResult {
        response_audio: Some(audio.clone()),
        ..RecognitionResult::default()
    }));

    assert_eq!(h.player.played_bytes(), [(audio, 2, 16_000)]);
    h.coordinator.stop();
}

#[test]
fn unhandled_transcript_plays_nothing() {
    let mut h = Harness::start(&["turn on light"], CoordinatorOptions::default());

    h.run_cycle(Ok(RecognitionResult {
        transcript: Some("gibberish".to_string()),
        response_audio: Some(vec![9, 9]),
        ..RecognitionResult::default()
    }));

    assert!(h.actor.handled().is_empty());
    assert!(h.player.played_bytes().is_empty());
    h.coordinator.stop();
}

#[test]
fn handled_command_with_always_respond_plays_audio() {
    let mut h = Harness::start(
        &["turn on light"],
        CoordinatorOptions {
            always_respond: true,
            apology_sound: None,
        },
    );

    let audio = vec![7_u8, 7];
    h.run_cycle(Ok(RecognitionResult {
        transcript: Some("turn on light".to_string()),
        response_audio: Some(audio.clone()),
        dialog_follow_on: false,
    }));

    assert_eq!(h.actor.handled(), ["turn on light"]);
    assert_eq!(h.player.played_bytes(), [(audio, 2, 16_000)]);
    h.coordinator.stop();
}

#[test]
fn handled_command_without_always_respond_stays_silent() {
    let mut h = Harness::start(&["turn on light"], CoordinatorOptions::default());

    h.run_cycle(Ok(RecognitionResult {
        transcript: Some("turn on light".to_string()),
        response_audio: Some(vec![7, 7]),
        dialog_follow_on: false,
    }));

    assert_eq!(h.actor.handled(), ["turn on light"]);
    assert!(h.player.played_bytes().is_empty());
    h.coordinator.stop();
}

#[test]
fn empty_result_plays_nothing() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.run_cycle(Ok(RecognitionResult::default()));

    assert!(h.actor.handled().is_empty());
    assert!(h.player.played_bytes().is_empty());
    h.coordinator.stop();
}

#[test]
fn follow_on_rearms_without_new_trigger() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.trigger.fire();
    assert!(wait_until(|| h.recognizer.recognize_calls() == 1));
    h.recognizer.finish_utterance();
    h.recognizer.push_result(Ok(RecognitionResult {
        dialog_follow_on: true,
        ..RecognitionResult::default()
    }));

    // The follow-on turn starts with no trigger activation.
    assert!(wait_until(|| h.recognizer.recognize_calls() == 2));
    h.recognizer.finish_utterance();
    h.recognizer.push_result(Ok(RecognitionResult::default()));
    assert!(wait_until(|| h.ready_reports() == 2));

    assert_eq!(
        h.statuses(),
        ["ready", "listening", "thinking", "listening", "thinking", "ready"]
    );
    // The trigger was only re-armed after the terminal cycle.
    assert_eq!(h.trigger.start_count(), 2);
    h.coordinator.stop();
}

#[test]
fn recognizer_error_recovers_with_apology() {
    let apology = PathBuf::from("/sounds/sorry.wav");
    let mut h = Harness::start(
        &[],
        CoordinatorOptions {
            always_respond: false,
            apology_sound: Some(apology.clone()),
        },
    );

    h.run_cycle(Err(Error::Recognizer("backend exploded".to_string())));

    assert_eq!(h.player.played_clips(), [apology]);
    assert_eq!(h.statuses(), ["ready", "listening", "thinking", "ready"]);

    // The loop keeps going after the failure.
    h.run_cycle(Ok(RecognitionResult::default()));
    assert_eq!(h.recognizer.recognize_calls(), 2);
    h.coordinator.stop();
}

#[test]
fn shutdown_while_idle_terminates_the_worker() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.coordinator.stop();

    assert_eq!(h.recognizer.recognize_calls(), 0);
    assert!(h.recognizer.session_ended());
    assert!(h.trigger.is_stopped());
    assert_eq!(h.statuses(), ["ready"]);
}

#[test]
fn shutdown_during_cycle_does_not_rearm() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    h.trigger.fire();
    assert!(wait_until(|| h.recognizer.recognize_calls() == 1));

    // stop() unblocks the recognizer; the worker must exit without
    // re-arming the trigger or reporting ready.
    h.coordinator.stop();

    assert_eq!(h.statuses(), ["ready", "listening"]);
    assert_eq!(h.trigger.start_count(), 1);
    assert!(h.player.played_bytes().is_empty());
}

#[test]
fn recognizer_holds_capture_slot_only_while_listening() {
    let mut h = Harness::start(&[], CoordinatorOptions::default());

    assert!(!h.recorder.has_processor());

    h.trigger.fire();
    assert!(wait_until(|| h.recorder.has_processor()));

    h.recognizer.finish_utterance();
    assert!(!h.recorder.has_processor());

    h.recognizer.push_result(Ok(RecognitionResult::default()));
    assert!(wait_until(|| h.ready_reports() == 2));
    assert!(!h.recorder.has_processor());
    h.coordinator.stop();
}

#[test]
fn actor_phrases_reach_the_recognizer() {
    let mut h = Harness::start(&["turn on light", "repeat"], CoordinatorOptions::default());

    assert_eq!(h.recognizer.phrases(), ["turn on light", "repeat"]);
    h.coordinator.stop();
}

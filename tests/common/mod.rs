//! Shared test doubles for the coordinator suite
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use hark::{
    AudioProcessor, CommandActor, Player, RecognitionResult, Result, SpeechRecognizer,
    TriggerCallback, TriggerSource, UtteranceEndCallback,
};

/// Poll `condition` until it holds or two seconds pass
pub fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Trigger double fired directly from tests
#[derive(Default)]
pub struct FakeTrigger {
    callback: Mutex<Option<TriggerCallback>>,
    starts: AtomicUsize,
    stopped: AtomicBool,
}

impl FakeTrigger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate one physical activation
    pub fn fire(&self) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl TriggerSource for FakeTrigger {
    fn set_callback(&self, callback: TriggerCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Frame sink for the fake recognizer
#[derive(Default)]
pub struct FrameSink {
    pub frames: AtomicUsize,
}

impl AudioProcessor for FrameSink {
    fn process(&self, frames: &[i16]) {
        self.frames.fetch_add(frames.len(), Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecognizerState {
    results: VecDeque<Result<RecognitionResult>>,
    session_ended: bool,
}

/// Scripted recognizer: `recognize` blocks until a result is pushed or
/// the session ends, mirroring the blocking backend call.
pub struct FakeRecognizer {
    state: Mutex<RecognizerState>,
    available: Condvar,
    sink: Arc<FrameSink>,
    utterance_end: Mutex<Option<UtteranceEndCallback>>,
    resets: AtomicUsize,
    recognize_calls: AtomicUsize,
    phrases: Mutex<Vec<String>>,
    audio_logging: AtomicBool,
}

impl FakeRecognizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RecognizerState::default()),
            available: Condvar::new(),
            sink: Arc::new(FrameSink::default()),
            utterance_end: Mutex::new(None),
            resets: AtomicUsize::new(0),
            recognize_calls: AtomicUsize::new(0),
            phrases: Mutex::new(Vec::new()),
            audio_logging: AtomicBool::new(false),
        })
    }

    /// Queue the result of the next `recognize` call
    pub fn push_result(&self, result: Result<RecognitionResult>) {
        self.state.lock().unwrap().results.push_back(result);
        self.available.notify_all();
    }

    /// Deliver the end-of-utterance notification, as the capture thread
    /// would
    pub fn finish_utterance(&self) {
        let callback = self.utterance_end.lock().unwrap();
        let callback = callback
            .as_ref()
            .expect("utterance-end callback not installed");
        callback();
    }

    pub fn recognize_calls(&self) -> usize {
        self.recognize_calls.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn session_ended(&self) -> bool {
        self.state.lock().unwrap().session_ended
    }

    pub fn phrases(&self) -> Vec<String> {
        self.phrases.lock().unwrap().clone()
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn set_utterance_end_callback(&self, callback: UtteranceEndCallback) {
        *self.utterance_end.lock().unwrap() = Some(callback);
    }

    fn processor(&self) -> Arc<dyn AudioProcessor> {
        Arc::clone(&self.sink) as Arc<dyn AudioProcessor>
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn recognize(&self) -> Result<RecognitionResult> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(result) = state.results.pop_front() {
                return result;
            }
            if state.session_ended {
                return Ok(RecognitionResult::default());
            }
            state = self.available.wait(state).unwrap();
        }
    }

    fn end_audio_session(&self) {
        self.state.lock().unwrap().session_ended = true;
        self.available.notify_all();
    }

    fn add_phrases(&self, actor: &dyn CommandActor) {
        *self.phrases.lock().unwrap() = actor.phrases();
    }

    fn set_audio_logging_enabled(&self, enabled: bool) {
        self.audio_logging.store(enabled, Ordering::SeqCst);
    }
}

/// Player double recording every playback
#[derive(Default)]
pub struct FakePlayer {
    pub clips: Mutex<Vec<PathBuf>>,
    pub bytes: Mutex<Vec<(Vec<u8>, u16, u32)>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played_bytes(&self) -> Vec<(Vec<u8>, u16, u32)> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn played_clips(&self) -> Vec<PathBuf> {
        self.clips.lock().unwrap().clone()
    }
}

impl Player for FakePlayer {
    fn play_clip(&self, path: &Path) -> Result<()> {
        self.clips.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn play_bytes(&self, bytes: &[u8], sample_width: u16, sample_rate_hz: u32) -> Result<()> {
        self.bytes
            .lock()
            .unwrap()
            .push((bytes.to_vec(), sample_width, sample_rate_hz));
        Ok(())
    }
}

/// Actor double handling a fixed set of commands
#[derive(Default)]
pub struct FakeActor {
    handles: Vec<String>,
    pub handled: Mutex<Vec<String>>,
}

impl FakeActor {
    pub fn handling<I: IntoIterator<Item = S>, S: Into<String>>(commands: I) -> Arc<Self> {
        Arc::new(Self {
            handles: commands.into_iter().map(Into::into).collect(),
            handled: Mutex::new(Vec::new()),
        })
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }
}

impl CommandActor for FakeActor {
    fn can_handle(&self, text: &str) -> bool {
        self.handles.iter().any(|c| c == text)
    }

    fn handle(&self, text: &str) -> bool {
        if self.can_handle(text) {
            self.handled.lock().unwrap().push(text.to_string());
            true
        } else {
            false
        }
    }

    fn phrases(&self) -> Vec<String> {
        self.handles.clone()
    }
}

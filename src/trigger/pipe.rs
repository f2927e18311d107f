//! Manual-signal trigger
//!
//! Watches a filesystem path; each time the file appears it is consumed
//! and the callback fires. Anything that can touch a file (a button
//! service, a shell one-liner, an HTTP endpoint) can activate the
//! system.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::Result;

use super::{TriggerCallback, TriggerSource};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct PipeWatch {
    path: PathBuf,
    armed: AtomicBool,
    running: AtomicBool,
    callback: Mutex<Option<TriggerCallback>>,
}

impl PipeWatch {
    fn poll_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            if self.armed.load(Ordering::SeqCst) && self.path.exists() {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    tracing::warn!(path = %self.path.display(), error = %e, "trigger file not consumed");
                }
                tracing::debug!(path = %self.path.display(), "trigger file consumed");
                let callback = self.callback.lock().unwrap().clone();
                if let Some(callback) = callback {
                    callback();
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Fires when the watched trigger file appears
pub struct PipeTrigger {
    watch: Arc<PipeWatch>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PipeTrigger {
    /// Create a trigger watching `path`
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            watch: Arc::new(PipeWatch {
                path,
                armed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                callback: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }
}

impl TriggerSource for PipeTrigger {
    fn set_callback(&self, callback: TriggerCallback) {
        *self.watch.callback.lock().unwrap() = Some(callback);
    }

    fn start(&self) -> Result<()> {
        self.watch.armed.store(true, Ordering::SeqCst);

        let mut thread = self.thread.lock().unwrap();
        if thread.is_none() {
            self.watch.running.store(true, Ordering::SeqCst);
            let watch = Arc::clone(&self.watch);
            let handle = std::thread::Builder::new()
                .name("hark-pipe-trigger".to_string())
                .spawn(move || watch.poll_loop())?;
            *thread = Some(handle);
            tracing::debug!(path = %self.watch.path.display(), "pipe trigger watching");
        }

        Ok(())
    }

    fn stop(&self) {
        self.watch.armed.store(false, Ordering::SeqCst);
        self.watch.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            if handle.join().is_err() {
                tracing::error!("pipe trigger watcher panicked");
            }
        }
    }
}

impl Drop for PipeTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Custom-sensor trigger
//!
//! An armed/disarmed gate around a cloneable handle. Wire any external
//! sensor (GPIO interrupt, motion detector, network message) to
//! [`SensorHandle::activate`] and use the trigger like the built-in
//! variants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::Result;

use super::{TriggerCallback, TriggerSource};

struct SensorInner {
    armed: AtomicBool,
    callback: Mutex<Option<TriggerCallback>>,
}

/// Activation handle for an external sensor
#[derive(Clone)]
pub struct SensorHandle {
    inner: Arc<SensorInner>,
}

impl SensorHandle {
    /// Signal one activation. Ignored while the trigger is disarmed.
    pub fn activate(&self) {
        if !self.inner.armed.load(Ordering::SeqCst) {
            return;
        }
        let callback = self.inner.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Trigger driven by an external sensor through a [`SensorHandle`]
pub struct SensorTrigger {
    inner: Arc<SensorInner>,
}

impl SensorTrigger {
    /// Create a trigger and the handle that activates it
    #[must_use]
    pub fn new() -> (Self, SensorHandle) {
        let inner = Arc::new(SensorInner {
            armed: AtomicBool::new(false),
            callback: Mutex::new(None),
        });
        let handle = SensorHandle {
            inner: Arc::clone(&inner),
        };
        (Self { inner }, handle)
    }
}

impl TriggerSource for SensorTrigger {
    fn set_callback(&self, callback: TriggerCallback) {
        *self.inner.callback.lock().unwrap() = Some(callback);
    }

    fn start(&self) -> Result<()> {
        self.inner.armed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.inner.armed.store(false, Ordering::SeqCst);
    }
}

//! Single-slot activation signal
//!
//! Wakes the recognition worker from trigger callbacks. Raising an
//! already-raised signal is a no-op, so overlapping activations (rapid
//! double button presses, a clap echoing) collapse into one cycle.

use std::sync::{Condvar, Mutex};

/// Coalescing single-slot wake signal.
///
/// Producers (trigger callbacks) raise it, the single consumer (the
/// recognition worker) waits on it and clears it once the cycle is done.
/// The raised flag is guarded by a mutex shared with the consumer's wait,
/// which lets [`raise_after`](Self::raise_after) run its preparation step
/// atomically with respect to the consumer.
#[derive(Debug, Default)]
pub struct ActivationSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl ActivationSignal {
    /// Create a new, unraised signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal, waking the consumer.
    ///
    /// Returns `false` if the signal was already raised (the raise
    /// coalesced into the pending one).
    ///
    /// # Panics
    ///
    /// Panics if the signal lock is poisoned.
    pub fn raise(&self) -> bool {
        self.raise_after(|| {})
    }

    /// Run `prepare`, then raise the signal, as one atomic step.
    ///
    /// If the signal is already raised, `prepare` does not run and `false`
    /// is returned. The consumer cannot observe the window between
    /// `prepare` and the raise: a worker that cleared the signal will not
    /// re-enter its wait until this call completes.
    ///
    /// # Panics
    ///
    /// Panics if the signal lock is poisoned.
    pub fn raise_after<F: FnOnce()>(&self, prepare: F) -> bool {
        let mut raised = self.raised.lock().unwrap();
        if *raised {
            return false;
        }
        prepare();
        *raised = true;
        self.cond.notify_all();
        true
    }

    /// Block until the signal is raised. Does not consume it.
    ///
    /// # Panics
    ///
    /// Panics if the signal lock is poisoned.
    pub fn wait_raised(&self) {
        let mut raised = self.raised.lock().unwrap();
        while !*raised {
            raised = self.cond.wait(raised).unwrap();
        }
    }

    /// Consume the signal, allowing the next raise through.
    ///
    /// # Panics
    ///
    /// Panics if the signal lock is poisoned.
    pub fn clear(&self) {
        *self.raised.lock().unwrap() = false;
    }

    /// Whether the signal is currently raised
    ///
    /// # Panics
    ///
    /// Panics if the signal lock is poisoned.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap()
    }
}

//! User status feedback
//!
//! A status pipe (named pipe or plain file) and an optional trigger sound
//! tell the user when the box is ready, listening or thinking.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::player::Player;

/// User-facing phase of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting for a trigger
    Ready,
    /// Capturing an utterance
    Listening,
    /// Recognition in progress
    Thinking,
}

impl Status {
    /// The wire name written to the status pipe
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gives the user status feedback.
///
/// Each transition writes the status name plus a newline to the pipe,
/// logs it, and plays the trigger sound when listening starts. A pipe or
/// sound path that does not exist at construction degrades to logging
/// only, with a one-time warning.
pub struct StatusReporter {
    player: Arc<dyn Player>,
    pipe: Option<PathBuf>,
    trigger_sound: Option<PathBuf>,
}

impl StatusReporter {
    /// Create a reporter, validating the configured paths
    #[must_use]
    pub fn new(
        player: Arc<dyn Player>,
        pipe: Option<PathBuf>,
        trigger_sound: Option<PathBuf>,
    ) -> Self {
        let pipe = pipe.and_then(|path| {
            if path.exists() {
                Some(path)
            } else {
                tracing::warn!(path = %path.display(), "status pipe does not exist, logging only");
                None
            }
        });

        let trigger_sound = trigger_sound.and_then(|path| {
            if path.exists() {
                Some(path)
            } else {
                tracing::warn!(path = %path.display(), "trigger sound does not exist, skipping");
                None
            }
        });

        Self {
            player,
            pipe,
            trigger_sound,
        }
    }

    /// Report a status transition
    pub fn report(&self, status: Status) {
        if let Some(pipe) = &self.pipe {
            if let Err(e) = write_status(pipe, status) {
                tracing::warn!(path = %pipe.display(), error = %e, "status pipe write failed");
            }
        }

        tracing::info!(status = %status, "status");

        if status == Status::Listening {
            if let Some(sound) = &self.trigger_sound {
                if let Err(e) = self.player.play_clip(sound) {
                    tracing::warn!(clip = %sound.display(), error = %e, "trigger sound failed");
                }
            }
        }
    }
}

fn write_status(path: &Path, status: Status) -> std::io::Result<()> {
    let mut pipe = std::fs::OpenOptions::new().append(true).open(path)?;
    writeln!(pipe, "{status}")
}

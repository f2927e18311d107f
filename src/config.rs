//! Configuration
//!
//! Layered: built-in defaults, then the TOML config file, then
//! environment variables. CLI flags override on top of the loaded value
//! in `main`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::trigger::TriggerKind;
use crate::Result;

const DEFAULT_STT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Hark configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Trigger variant to arm
    pub trigger: TriggerKind,

    /// Path watched by the pipe trigger
    pub trigger_pipe: PathBuf,

    /// Status feedback pipe (LED controller, dashboard, ...)
    pub status_pipe: Option<PathBuf>,

    /// WAV clip played when listening starts
    pub trigger_sound: Option<PathBuf>,

    /// WAV clip played when a recognition cycle fails
    pub apology_sound: Option<PathBuf>,

    /// Play response audio even for locally handled commands
    pub always_respond: bool,

    /// Dump utterance audio to the temp dir
    pub audio_logging: bool,

    /// Transcription backend
    pub stt: SttConfig,
}

/// Transcription backend configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Whisper-style transcription endpoint
    pub endpoint: String,

    /// Bearer token for the endpoint
    pub api_key: String,

    /// Model identifier sent with each request
    pub model: String,

    /// Optional language hint (e.g. "en")
    pub language: Option<String>,
}

/// On-disk configuration file shape; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    trigger: Option<TriggerKind>,
    trigger_pipe: Option<PathBuf>,
    status_pipe: Option<PathBuf>,
    trigger_sound: Option<PathBuf>,
    apology_sound: Option<PathBuf>,
    always_respond: Option<bool>,
    audio_logging: Option<bool>,
    stt: FileSttConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSttConfig {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    language: Option<String>,
}

/// Default config file location (`~/.config/hark/config.toml` on Linux)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hark")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load configuration from `path` (or the default location) layered
    /// over built-in defaults and environment variables.
    ///
    /// A missing file is not an error; a malformed file or an unknown
    /// trigger kind is, and aborts startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path.map(Path::to_path_buf);
        let path = explicit.or_else(default_config_path);

        let file = match &path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let file: FileConfig = toml::from_str(&raw)?;
                tracing::debug!(path = %path.display(), "loaded config file");
                file
            }
            _ => FileConfig::default(),
        };

        let api_key = std::env::var("HARK_STT_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .or(file.stt.api_key)
            .unwrap_or_default();

        Ok(Self {
            trigger: file.trigger.unwrap_or(TriggerKind::Pipe),
            trigger_pipe: file
                .trigger_pipe
                .unwrap_or_else(|| std::env::temp_dir().join("hark-trigger")),
            status_pipe: file.status_pipe,
            trigger_sound: file.trigger_sound,
            apology_sound: file.apology_sound,
            always_respond: file.always_respond.unwrap_or(false),
            audio_logging: file.audio_logging.unwrap_or(false),
            stt: SttConfig {
                endpoint: file
                    .stt
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_STT_ENDPOINT.to_string()),
                api_key,
                model: file.stt.model.unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
                language: file.stt.language,
            },
        })
    }
}

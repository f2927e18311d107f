use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hark::{
    trigger, AudioProcessor, AudioRecorder, CaptureStream, CloudRecognizer, Config,
    CoordinatorOptions, CpalPlayer, KeywordActor, MicCoordinator, Player, StatusReporter,
    TriggerKind,
};

/// Hark - act on voice commands
#[derive(Parser)]
#[command(name = "hark", version, about)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "HARK_CONFIG")]
    config: Option<PathBuf>,

    /// Trigger to use
    #[arg(short, long, env = "HARK_TRIGGER", value_enum)]
    trigger: Option<TriggerKind>,

    /// Status feedback pipe
    #[arg(long, env = "HARK_STATUS_PIPE")]
    status_pipe: Option<PathBuf>,

    /// Sound played when the trigger is activated (WAV format)
    #[arg(long)]
    trigger_sound: Option<PathBuf>,

    /// Sound played when a recognition cycle fails (WAV format)
    #[arg(long)]
    apology_sound: Option<PathBuf>,

    /// Play response audio even for locally handled commands
    #[arg(long)]
    always_respond: bool,

    /// Log utterance audio as WAV files in the temp dir
    #[arg(long)]
    audio_logging: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,hark=info",
        1 => "info,hark=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
        };
    }

    let mut config = Config::load(cli.config.as_deref())?;

    // CLI flags override the loaded configuration.
    if let Some(kind) = cli.trigger {
        config.trigger = kind;
    }
    if let Some(pipe) = cli.status_pipe {
        config.status_pipe = Some(pipe);
    }
    if let Some(sound) = cli.trigger_sound {
        config.trigger_sound = Some(sound);
    }
    if let Some(sound) = cli.apology_sound {
        config.apology_sound = Some(sound);
    }
    config.always_respond |= cli.always_respond;
    config.audio_logging |= cli.audio_logging;

    tracing::info!(trigger = ?config.trigger, "starting hark");

    let player: Arc<dyn Player> = Arc::new(CpalPlayer::new()?);
    let recorder = Arc::new(AudioRecorder::new());
    let recognizer = Arc::new(CloudRecognizer::new(&config.stt)?);
    recognizer.set_audio_logging_enabled(config.audio_logging);

    // Add local voice commands here.
    let actor = Arc::new(KeywordActor::new());

    let trigger = trigger::from_config(&config, Arc::clone(&recorder));
    let status = StatusReporter::new(
        Arc::clone(&player),
        config.status_pipe.clone(),
        config.trigger_sound.clone(),
    );

    let mut capture = CaptureStream::new(Arc::clone(&recorder))?;
    capture.start()?;

    let mut coordinator = MicCoordinator::start(
        actor,
        recognizer,
        recorder,
        player,
        trigger,
        status,
        CoordinatorOptions {
            always_respond: config.always_respond,
            apology_sound: config.apology_sound.clone(),
        },
    )?;

    if std::io::stdout().is_terminal() {
        let hint = match config.trigger {
            TriggerKind::Pipe => format!("Touch {}", config.trigger_pipe.display()),
            TriggerKind::Clap => "Clap your hands".to_string(),
        };
        println!("{hint} then speak, or press Ctrl-C to quit...");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    coordinator.stop();
    capture.stop();

    Ok(())
}

/// Running level meter over the capture pipeline
#[derive(Default)]
struct LevelMeter {
    sum_squares: AtomicUsize,
    samples: AtomicUsize,
    peak: AtomicUsize,
}

impl LevelMeter {
    fn take(&self) -> (f64, f64) {
        let sum_squares = self.sum_squares.swap(0, Ordering::SeqCst);
        let samples = self.samples.swap(0, Ordering::SeqCst);
        let peak = self.peak.swap(0, Ordering::SeqCst);

        if samples == 0 {
            return (0.0, 0.0);
        }

        #[allow(clippy::cast_precision_loss)]
        let rms = (sum_squares as f64 / samples as f64).sqrt() / 32768.0;
        #[allow(clippy::cast_precision_loss)]
        let peak = peak as f64 / 32768.0;
        (rms, peak)
    }
}

impl AudioProcessor for LevelMeter {
    fn process(&self, frames: &[i16]) {
        let sum_squares: usize = frames
            .iter()
            .map(|&s| {
                let s = i64::from(s);
                usize::try_from(s * s).unwrap_or_default()
            })
            .sum();
        let peak = frames
            .iter()
            .map(|&s| i64::from(s).unsigned_abs() as usize)
            .max()
            .unwrap_or_default();

        self.sum_squares.fetch_add(sum_squares, Ordering::SeqCst);
        self.samples.fetch_add(frames.len(), Ordering::SeqCst);
        self.peak.fetch_max(peak, Ordering::SeqCst);
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let recorder = Arc::new(AudioRecorder::new());
    let meter = Arc::new(LevelMeter::default());
    recorder
        .add_processor(Arc::clone(&meter) as Arc<dyn AudioProcessor>)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut capture = CaptureStream::new(Arc::clone(&recorder))?;
    capture.start()?;
    println!("Sample rate: {} Hz", hark::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (rms, peak) = meter.take();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let bar: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {rms:.4} | Peak: {peak:.4} | [{bar}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let player = CpalPlayer::new()?;

    let sample_rate = 16_000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let bytes: Vec<u8> = (0..num_samples)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3;
            ((sample * 32767.0) as i16).to_le_bytes()
        })
        .collect();

    println!("Playing {num_samples} samples at {sample_rate} Hz...");
    player.play_bytes(&bytes, 2, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

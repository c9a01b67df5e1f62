use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pitch_stream::config::DetectorConfig;
use pitch_stream::constants::{AUDIO_SAMPLE_RATE, MODEL_PATH};
use pitch_stream::inference::{InferenceAdapter, OnnxPitchModel, PitchModel};
use pitch_stream::postprocessing::midi::{generate_midi_file_data, MIN_BPM};
use pitch_stream::preprocessing::load_audio::load_mono_audio;
use pitch_stream::replay::replay_samples;
use pitch_stream::server::{serve, ServerState};

#[derive(Parser, Debug)]
#[command(version, about = "Live microphone to note-event transcription")]
struct Cli {
    /// Path to the Basic Pitch ONNX model
    #[arg(long, global = true, env = "PITCH_STREAM_MODEL", default_value = MODEL_PATH)]
    model: PathBuf,

    /// Detector tuning overrides (TOML)
    #[arg(long, global = true, env = "PITCH_STREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept audio streams over websockets
    Serve {
        #[arg(long, env = "PITCH_STREAM_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(long, env = "PITCH_STREAM_PORT", default_value_t = 8000)]
        port: u16,

        /// Write each finished session as a MIDI file here
        #[arg(long, env = "PITCH_STREAM_EXPORT_DIR")]
        export_dir: Option<PathBuf>,
    },
    /// Run a WAV file through the live pipeline and print its events
    Replay {
        input: PathBuf,

        /// Also write the detected notes as a MIDI file
        #[arg(long)]
        midi_out: Option<PathBuf>,

        /// Tempo of the MIDI file
        #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u32).range((MIN_BPM as i64)..))]
        bpm: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    config.validate().context("invalid detector config")?;

    let model: Arc<dyn PitchModel> = Arc::new(
        OnnxPitchModel::load(&cli.model, config.window_length)
            .with_context(|| format!("failed to load model from {}", cli.model.display()))?,
    );

    match cli.command {
        Command::Serve { host, port, export_dir } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .context("failed to parse listen address")?;
            let state = Arc::new(ServerState {
                adapter: InferenceAdapter::new(model),
                config,
                export_dir,
            });
            serve(state, addr).await
        }
        Command::Replay { input, midi_out, bpm } => {
            let samples = load_mono_audio(&input, AUDIO_SAMPLE_RATE as u32)
                .with_context(|| format!("failed to load {}", input.display()))?;
            info!(samples = samples.len(), "replaying recording");

            let notes = tokio::task::spawn_blocking(move || {
                let stdout = std::io::stdout();
                let mut out = BufWriter::new(stdout.lock());
                let notes = replay_samples(&samples, &config, model.as_ref(), &mut out)?;
                out.flush()?;
                Ok::<_, anyhow::Error>(notes)
            })
            .await
            .context("replay task failed")??;
            info!(notes = notes.len(), "replay finished");

            if let Some(path) = midi_out {
                let data = generate_midi_file_data(&notes, bpm).context("failed to encode MIDI")?;
                std::fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "wrote MIDI file");
            }
            Ok(())
        }
    }
}

fn init_logging(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

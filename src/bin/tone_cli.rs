use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tone_engine::config::AppConfig;
use tone_engine::engine::{AudioEngine, LevelMeterDelegate, OfflineBackend, UpdatePoller};

#[derive(Parser, Debug)]
#[command(name = "tone_cli", about = "Sine tone engine harness")]
struct Cli {
    /// Engine configuration JSON (defaults to the platform config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a tone on the default audio device while printing levels
    Play {
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,
        #[arg(long, default_value_t = 0.2)]
        amplitude: f32,
        #[arg(long, default_value_t = 3.0)]
        seconds: f32,
    },
    /// Render a tone offline to a 32-bit float WAV file
    Render {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
        /// Glide to this frequency halfway through
        #[arg(long)]
        glide_to: Option<f32>,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

fn main() -> ExitCode {
    tone_engine::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_platform(),
    };

    match cli.command {
        Commands::Play {
            frequency,
            amplitude,
            seconds,
        } => run_play(config, frequency, amplitude, seconds),
        Commands::Render {
            output,
            frequency,
            amplitude,
            seconds,
            glide_to,
        } => run_render(config, output, frequency, amplitude, seconds, glide_to),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

/// Prints a two-bar level meter on one terminal line.
#[derive(Default)]
struct ConsoleMeter {
    input: AtomicU32,
    output: AtomicU32,
}

impl ConsoleMeter {
    fn draw(&self) {
        let input = f32::from_bits(self.input.load(Ordering::Relaxed));
        let output = f32::from_bits(self.output.load(Ordering::Relaxed));
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\rin  {:<20} out {:<20}", bar(input), bar(output));
        let _ = stdout.flush();
    }
}

fn bar(level: f32) -> String {
    "#".repeat((level.clamp(0.0, 1.0) * 20.0).round() as usize)
}

impl LevelMeterDelegate for ConsoleMeter {
    fn input_level_changed(&self, level: f32) {
        self.input.store(level.to_bits(), Ordering::Relaxed);
        self.draw();
    }

    fn output_level_changed(&self, level: f32) {
        self.output.store(level.to_bits(), Ordering::Relaxed);
        self.draw();
    }
}

fn run_play(config: AppConfig, frequency: f32, amplitude: f32, seconds: f32) -> Result<ExitCode> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive (got {seconds})");
    }

    let interval = Duration::from_millis(config.metering.update_interval_ms);
    let engine = Arc::new(AudioEngine::new(config));
    let meter = Arc::new(ConsoleMeter::default());
    engine.set_delegate(&meter);
    engine.set_tone_frequency(frequency);
    engine.set_tone_amplitude(amplitude);

    engine.start().context("starting audio engine")?;
    if let Some(format) = engine.stream_format() {
        println!(
            "Playing {:.1} Hz at {:.2} on {} Hz, {} ch",
            engine.tone_frequency(),
            engine.tone_amplitude(),
            format.sample_rate,
            format.output_channels
        );
    }

    let polled = Arc::clone(&engine);
    let mut poller = UpdatePoller::spawn(interval, move || polled.update())
        .context("starting update poller")?;

    thread::sleep(Duration::from_secs_f32(seconds));

    // Fade out before closing the stream.
    engine.set_tone_amplitude(0.0);
    thread::sleep(Duration::from_millis(100));
    poller.stop();
    engine.stop().context("stopping audio engine")?;
    println!();
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct RenderReport<'a> {
    output: &'a str,
    sample_rate: f32,
    channels: u16,
    frames: usize,
    peak: f32,
    output_level: f32,
}

fn run_render(
    mut config: AppConfig,
    output: PathBuf,
    frequency: f32,
    amplitude: f32,
    seconds: f32,
    glide_to: Option<f32>,
) -> Result<ExitCode> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive (got {seconds})");
    }
    // No capture device offline.
    config.audio.input_channels = 0;

    let (backend, driver) = OfflineBackend::new();
    let engine = AudioEngine::with_backend(config, Box::new(backend));
    engine.set_tone_frequency(frequency);
    engine.set_tone_amplitude(amplitude);
    engine.start().context("starting offline engine")?;

    let format = engine
        .stream_format()
        .context("offline engine reported no stream format")?;
    let total_frames = (seconds * format.sample_rate).round() as usize;
    let block_frames = (format.buffer_size_in_frames as usize).max(1);

    let spec = hound::WavSpec {
        channels: format.output_channels,
        sample_rate: format.sample_rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output, spec)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut rendered = 0;
    let mut peak = 0.0_f32;
    let mut glided = false;
    while rendered < total_frames {
        if let Some(target) = glide_to {
            if !glided && rendered >= total_frames / 2 {
                engine.set_tone_frequency(target);
                glided = true;
            }
        }

        let frames = block_frames.min(total_frames - rendered);
        let samples = driver.render(frames)?;
        for sample in samples {
            peak = peak.max(sample.abs());
            writer.write_sample(sample)?;
        }
        rendered += frames;
        engine.update();
    }

    writer
        .finalize()
        .with_context(|| format!("finalizing {}", output.display()))?;
    engine.stop()?;

    let report = RenderReport {
        output: &output.to_string_lossy(),
        sample_rate: format.sample_rate,
        channels: format.output_channels,
        frames: rendered,
        peak,
        output_level: engine.output_level(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

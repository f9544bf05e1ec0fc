//! Aria CLI - The `aria` command.
//!
//! A thin collaborator around `aria-core`: it loads a sequence from a JSON
//! file produced by the upstream generator and plays it, exports it as a
//! Standard MIDI File, prints its script form, renders it to WAV, or lists
//! the audio output devices. All of the engineering lives in the core; this
//! binary is file I/O and argument parsing.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use aria_core::{
    list_output_devices, render_wav, sequence_to_midi, sequence_to_script, AudioEngine,
    EngineConfig, PlaybackPhase, PlaybackScheduler, RenderOptions, Sequence, Waveform,
};

/// Aria - note sequence playback and export
#[derive(Parser, Debug)]
#[command(name = "aria")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play, export and render musical sequences", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a sequence through the default audio output
    Play {
        /// Path to the sequence JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Oscillator waveform (sine, square, triangle, sawtooth)
        #[arg(short, long, default_value = "sine")]
        waveform: String,

        /// Master gain (0.0 - 1.0)
        #[arg(short, long, default_value_t = 0.5)]
        gain: f32,
    },

    /// Export a sequence as a Type-0 Standard MIDI File
    Export {
        /// Path to the sequence JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output .mid path
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Print the textual script form of a sequence
    Script {
        /// Path to the sequence JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Render a sequence to a 16-bit mono WAV file
    Render {
        /// Path to the sequence JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output .wav path
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Oscillator waveform (sine, square, triangle, sawtooth)
        #[arg(short, long, default_value = "sine")]
        waveform: String,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
    },

    /// List audio output devices
    Devices,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Play {
            file,
            waveform,
            gain,
        } => play(file, &waveform, gain),
        Commands::Export { file, output } => export(file, output),
        Commands::Script { file } => script(file),
        Commands::Render {
            file,
            output,
            waveform,
            sample_rate,
        } => render(file, output, &waveform, sample_rate),
        Commands::Devices => devices(),
    }
}

/// Load a sequence from a JSON file.
fn load_sequence(path: &PathBuf) -> Result<Sequence> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sequence file {}", path.display()))?;
    let sequence: Sequence = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sequence file {}", path.display()))?;
    Ok(sequence)
}

fn parse_waveform(name: &str) -> Result<Waveform> {
    Waveform::from_name(name)
        .with_context(|| format!("Unknown waveform '{name}' (expected sine, square, triangle or sawtooth)"))
}

fn play(file: PathBuf, waveform: &str, gain: f32) -> Result<()> {
    let sequence = load_sequence(&file)?;
    let waveform = parse_waveform(waveform)?;

    let engine = AudioEngine::new(EngineConfig {
        device: None,
        master_gain: gain.clamp(0.0, 1.0),
    });
    let mut scheduler = PlaybackScheduler::new(engine);
    scheduler.set_waveform(waveform);
    scheduler.start(&sequence).context("Failed to start playback")?;

    let title = if sequence.title.is_empty() {
        file.display().to_string()
    } else {
        sequence.title.clone()
    };
    log::info!(
        "Playing '{title}': {} notes, {:.1}s",
        sequence.len(),
        sequence.total_duration()
    );

    let state = scheduler.state();
    let mut last_note = None;
    while scheduler.phase() == PlaybackPhase::Playing {
        let snapshot = state.snapshot();
        if snapshot.is_playing && snapshot.current_note != last_note {
            last_note = snapshot.current_note;
            if let Some(index) = snapshot.current_note {
                let note = &sequence.notes[index];
                if note.is_silent() {
                    log::info!("[{:>3}] rest ({:.3}s)", index + 1, note.duration);
                } else {
                    let label = note.name.clone().unwrap_or_else(|| {
                        aria_core::frequency_to_name(note.frequency)
                            .unwrap_or_else(|_| format!("{:.2} Hz", note.frequency))
                    });
                    log::info!("[{:>3}] {label} ({:.3}s)", index + 1, note.duration);
                }
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Done");
    Ok(())
}

fn export(file: PathBuf, output: PathBuf) -> Result<()> {
    let sequence = load_sequence(&file)?;
    let bytes = sequence_to_midi(&sequence).context("Export failed")?;
    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn script(file: PathBuf) -> Result<()> {
    let sequence = load_sequence(&file)?;
    print!("{}", sequence_to_script(&sequence));
    Ok(())
}

fn render(file: PathBuf, output: PathBuf, waveform: &str, sample_rate: u32) -> Result<()> {
    let sequence = load_sequence(&file)?;
    let options = RenderOptions {
        sample_rate,
        waveform: parse_waveform(waveform)?,
        ..RenderOptions::default()
    };
    render_wav(&sequence, &output, &options).context("Render failed")?;
    log::info!("Wrote {}", output.display());
    Ok(())
}

fn devices() -> Result<()> {
    let devices = list_output_devices().context("Failed to enumerate audio devices")?;
    if devices.is_empty() {
        println!("No audio output devices found.");
        return Ok(());
    }

    println!("Available audio output devices:\n");
    for device in devices {
        let marker = if device.is_default { " [default]" } else { "" };
        println!("  {}{}", device.name, marker);
        println!("    Channels:     {}", device.max_channels);
        if !device.sample_rates.is_empty() {
            let rates: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
            println!("    Sample rates: {}", rates.join(", "));
        }
        println!();
    }
    Ok(())
}

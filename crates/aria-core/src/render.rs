//! Offline rendering of a sequence to WAV.
//!
//! Runs the same oscillator and envelope math as the realtime engine, but
//! against a deterministic sample counter instead of a device clock, and
//! writes the result as 16-bit mono PCM.

use std::path::Path;

use crate::envelope::EnvelopeCurve;
use crate::error::Result;
use crate::score::{EnvelopeParams, Sequence};
use crate::validation;
use crate::voice::Waveform;

/// Options for an offline render.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Oscillator shape for every note.
    pub waveform: Waveform,
    /// Envelope applied per note.
    pub envelope: EnvelopeParams,
    /// Output amplitude scale.
    pub amplitude: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            waveform: Waveform::Sine,
            envelope: EnvelopeParams::default(),
            amplitude: 0.5,
        }
    }
}

/// Render a sequence to a mono f32 sample buffer.
pub fn render_samples(sequence: &Sequence, options: &RenderOptions) -> Result<Vec<f32>> {
    validation::ensure_playable(sequence)?;

    let rate = options.sample_rate as f64;
    let total_samples = (sequence.total_duration() * rate).ceil() as usize;
    let mut buffer = vec![0.0f32; total_samples];

    let offsets = sequence.start_offsets();
    for (i, note) in sequence.notes.iter().enumerate() {
        if note.is_silent() {
            continue;
        }
        let start = (offsets[i] * rate).round() as usize;
        let length = (note.duration * rate).round() as usize;
        let curve = EnvelopeCurve::plan(&options.envelope, note.duration);
        let phase_increment = (note.frequency / rate) as f32;

        let mut phase = 0.0f32;
        for k in 0..length {
            let index = start + k;
            if index >= buffer.len() {
                break;
            }
            let level = curve.level_at(k as f64 / rate) as f32;
            buffer[index] += options.waveform.sample(phase) * level * options.amplitude;
            phase = (phase + phase_increment).fract();
        }
    }

    Ok(buffer)
}

/// Render a sequence to a 16-bit mono WAV file.
pub fn render_wav(sequence: &Sequence, path: &Path, options: &RenderOptions) -> Result<()> {
    let samples = render_samples(sequence, options)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: options.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    log::info!("rendered {} notes to {}", sequence.len(), path.display());
    Ok(())
}

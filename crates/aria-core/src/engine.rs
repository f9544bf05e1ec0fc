//! Audio engine: the sound-production backend for playback.
//!
//! The [`AudioEngine`] is an explicitly constructed, explicitly owned handle
//! (no global audio singleton). It owns the set of live voices and a sample
//! clock that is authoritative for audio timing: the scheduler submits whole
//! batches of [`VoicePlan`]s whose start offsets are converted to absolute
//! positions on that clock in one locked pass, so either all voices of a
//! scheduling pass exist or none do, and earlier notes always start at
//! earlier or equal positions than later ones.
//!
//! Two backends share the same scheduling semantics:
//!
//! - the cpal output stream, built lazily on first use and released when the
//!   engine is dropped;
//! - a no-op backend ([`AudioEngine::noop`]) that advances its clock from
//!   wall time and produces no sound, used by tests and validation.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::envelope::EnvelopeCurve;
use crate::error::{Error, Result};
use crate::voice::{Voice, Waveform};

/// Sample rate assumed until a real stream reports its own.
const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Margin added when converting batch offsets to absolute sample positions,
/// so the first note never lands in the past of the audio callback.
const SCHEDULE_LEAD_IN: f64 = 0.03;

/// Audio engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Output device name (None = system default).
    pub device: Option<String>,
    /// Master gain applied to the mixed output.
    pub master_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: None,
            master_gain: 0.5,
        }
    }
}

/// A planned voice: one non-rest note, as the scheduler hands it over.
#[derive(Clone, Debug)]
pub struct VoicePlan {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Start offset in seconds from the batch epoch.
    pub start_offset: f64,
    /// Sounding duration in seconds.
    pub duration: f64,
    /// Amplitude curve planned for the full note.
    pub envelope: EnvelopeCurve,
    /// Offset into the envelope, non-zero when resuming a note mid-curve.
    pub envelope_offset: f64,
    /// Oscillator shape.
    pub waveform: Waveform,
}

/// State shared with the audio callback.
pub(crate) struct EngineShared {
    voices: Vec<Voice>,
    samples_rendered: u64,
    sample_rate: f64,
    master_gain: f32,
    realtime: bool,
    epoch: Instant,
}

impl EngineShared {
    /// Current position on the engine's sample clock.
    fn current_sample(&self) -> u64 {
        if self.realtime {
            self.samples_rendered
        } else {
            (self.epoch.elapsed().as_secs_f64() * self.sample_rate) as u64
        }
    }

    /// Drop voices whose end position has passed.
    pub(crate) fn reap_finished(&mut self) {
        let position = self.current_sample();
        self.voices.retain(|v| !v.is_finished(position));
    }

    /// Remove every live and pending voice.
    pub(crate) fn cancel_all(&mut self) {
        self.voices.clear();
    }

    pub(crate) fn voice_count(&self) -> usize {
        self.voices.len()
    }
}

enum Backend {
    /// Silent backend with a wall-time sample clock.
    Noop,
    /// Realtime backend, stream not yet built.
    Uninitialized,
    /// Realtime backend with a running output stream.
    Stream(cpal::Stream),
}

/// The sound-production backend handle passed to the scheduler.
pub struct AudioEngine {
    shared: Arc<Mutex<EngineShared>>,
    config: EngineConfig,
    backend: Backend,
}

impl AudioEngine {
    /// Create an engine that will drive a cpal output stream.
    ///
    /// The constructor is cheap; the stream is built by the first
    /// [`ensure_started`](Self::ensure_started).
    pub fn new(config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(EngineShared {
                voices: Vec::new(),
                samples_rendered: 0,
                sample_rate: DEFAULT_SAMPLE_RATE,
                master_gain: config.master_gain,
                realtime: true,
                epoch: Instant::now(),
            })),
            config,
            backend: Backend::Uninitialized,
        }
    }

    /// Create a silent engine with the same scheduling semantics.
    pub fn noop() -> Self {
        let config = EngineConfig::default();
        Self {
            shared: Arc::new(Mutex::new(EngineShared {
                voices: Vec::new(),
                samples_rendered: 0,
                sample_rate: DEFAULT_SAMPLE_RATE,
                master_gain: config.master_gain,
                realtime: false,
                epoch: Instant::now(),
            })),
            config,
            backend: Backend::Noop,
        }
    }

    /// Whether this engine is the silent no-op backend.
    pub fn is_noop(&self) -> bool {
        matches!(self.backend, Backend::Noop)
    }

    /// One-time initialization of the sound subsystem.
    ///
    /// Builds and starts the output stream on the first call; later calls
    /// are no-ops. Failure is fatal for the playback attempt that triggered
    /// it, not for the process.
    pub fn ensure_started(&mut self) -> Result<()> {
        if !matches!(self.backend, Backend::Uninitialized) {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = match &self.config.device {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::EngineUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| {
                    Error::EngineUnavailable(format!("output device '{name}' not found"))
                })?,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::EngineUnavailable("no default output device".to_string()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| Error::EngineUnavailable(e.to_string()))?;
        let sample_rate = supported.sample_rate().0 as f64;
        let stream_config: cpal::StreamConfig = supported.config();

        if let Ok(mut shared) = self.shared.lock() {
            shared.sample_rate = sample_rate;
        }

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, self.shared.clone())
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, self.shared.clone())
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, self.shared.clone())
            }
            other => Err(Error::EngineUnavailable(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;
        stream
            .play()
            .map_err(|e| Error::EngineUnavailable(e.to_string()))?;

        log::info!(
            "audio engine started: {} @ {} Hz",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string()),
            sample_rate
        );
        self.backend = Backend::Stream(stream);
        Ok(())
    }

    /// Submit a batch of planned voices atomically.
    ///
    /// Offsets are resolved against the engine's sample clock in a single
    /// locked pass, with a small lead-in so the earliest voice is still in
    /// the future when the callback next runs.
    pub fn schedule(&self, plans: &[VoicePlan]) {
        let Ok(mut shared) = self.shared.lock() else {
            return;
        };
        let rate = shared.sample_rate;
        let base = shared.current_sample() + (SCHEDULE_LEAD_IN * rate) as u64;
        for plan in plans {
            let start_sample = base + (plan.start_offset * rate).round() as u64;
            let end_sample = start_sample + (plan.duration * rate).round().max(1.0) as u64;
            shared.voices.push(Voice {
                frequency: plan.frequency,
                start_sample,
                end_sample,
                envelope: plan.envelope,
                envelope_offset: plan.envelope_offset,
                waveform: plan.waveform,
                phase: 0.0,
            });
        }
        log::debug!("scheduled {} voices", plans.len());
    }

    /// Cancel every live and pending voice immediately.
    ///
    /// Cancelling voices that already finished is a no-op.
    pub fn cancel_all(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.cancel_all();
        }
    }

    /// Number of voices that are live or pending right now.
    pub fn active_voices(&self) -> usize {
        match self.shared.lock() {
            Ok(mut shared) => {
                shared.reap_finished();
                shared.voice_count()
            }
            Err(_) => 0,
        }
    }

    /// The engine's sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.shared
            .lock()
            .map(|s| s.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Shared handle for the scheduler's reporter tick.
    pub(crate) fn shared(&self) -> Arc<Mutex<EngineShared>> {
        self.shared.clone()
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.backend {
            Backend::Noop => "noop",
            Backend::Uninitialized => "uninitialized",
            Backend::Stream(_) => "stream",
        };
        f.debug_struct("AudioEngine")
            .field("backend", &kind)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Mutex<EngineShared>>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("audio stream error: {err}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                render_block(data, channels, &shared);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::EngineUnavailable(e.to_string()))
}

/// Mix all live voices into one output buffer.
fn render_block<T>(data: &mut [T], channels: usize, shared: &Arc<Mutex<EngineShared>>)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let Ok(mut shared) = shared.lock() else {
        for sample in data.iter_mut() {
            *sample = T::from_sample(0.0);
        }
        return;
    };

    let rate = shared.sample_rate;
    let gain = shared.master_gain;

    for frame in data.chunks_mut(channels) {
        let position = shared.samples_rendered;
        let mut mix = 0.0f32;
        for voice in shared.voices.iter_mut() {
            mix += voice.render(position, rate);
        }
        shared.samples_rendered = position + 1;

        let value = T::from_sample(mix * gain);
        for sample in frame.iter_mut() {
            *sample = value;
        }
    }

    shared.reap_finished();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::EnvelopeParams;

    fn plan(start_offset: f64, duration: f64) -> VoicePlan {
        VoicePlan {
            frequency: 440.0,
            start_offset,
            duration,
            envelope: EnvelopeCurve::plan(&EnvelopeParams::default(), duration),
            envelope_offset: 0.0,
            waveform: Waveform::Sine,
        }
    }

    #[test]
    fn test_noop_engine_schedules_and_cancels() {
        let engine = AudioEngine::noop();
        engine.schedule(&[plan(0.0, 10.0), plan(10.0, 10.0)]);
        assert_eq!(engine.active_voices(), 2);

        engine.cancel_all();
        assert_eq!(engine.active_voices(), 0);

        // Cancelling with nothing live is a no-op, not an error.
        engine.cancel_all();
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_batch_preserves_note_ordering() {
        let engine = AudioEngine::noop();
        engine.schedule(&[plan(0.0, 0.5), plan(0.5, 0.25), plan(0.75, 0.75)]);

        let shared = engine.shared();
        let shared = shared.lock().unwrap();
        let starts: Vec<u64> = shared.voices.iter().map(|v| v.start_sample).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_ensure_started_is_a_noop_for_silent_engine() {
        let mut engine = AudioEngine::noop();
        assert!(engine.ensure_started().is_ok());
        assert!(engine.is_noop());
    }
}

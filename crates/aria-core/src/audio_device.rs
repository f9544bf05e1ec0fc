//! Audio output device enumeration.
//!
//! Cross-platform discovery of output devices via cpal, used by the CLI's
//! `devices` command and by callers that want to pin the engine to a
//! specific device name.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{Error, Result};

/// Candidate sample rates probed against each device's supported ranges.
const CANDIDATE_RATES: [u32; 5] = [22_050, 44_100, 48_000, 88_200, 96_000];

/// Information about an audio output device.
#[derive(Clone, Debug)]
pub struct OutputDeviceInfo {
    /// Device name (as reported by the system)
    pub name: String,
    /// Maximum supported output channels
    pub max_channels: u32,
    /// Supported sample rates (sorted)
    pub sample_rates: Vec<u32>,
    /// Whether this is the default output device
    pub is_default: bool,
}

/// List all available audio output devices, default first.
pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    let all_devices = host
        .output_devices()
        .map_err(|e| Error::EngineUnavailable(e.to_string()))?;

    for device in all_devices {
        let name = match device.name() {
            Ok(n) => n,
            Err(_) => continue, // Skip devices we can't get a name for
        };

        let configs: Vec<_> = match device.supported_output_configs() {
            Ok(configs) => configs.collect(),
            Err(_) => continue,
        };

        let max_channels = configs.iter().map(|c| c.channels() as u32).max().unwrap_or(0);
        if max_channels == 0 {
            continue;
        }

        let mut sample_rates = Vec::new();
        for config in &configs {
            let min = config.min_sample_rate();
            let max = config.max_sample_rate();
            for rate in CANDIDATE_RATES.map(cpal::SampleRate) {
                if rate >= min && rate <= max && !sample_rates.contains(&rate.0) {
                    sample_rates.push(rate.0);
                }
            }
        }
        sample_rates.sort_unstable();

        let is_default = default_name.as_ref().is_some_and(|default| default == &name);
        devices.push(OutputDeviceInfo {
            name,
            max_channels,
            sample_rates,
            is_default,
        });
    }

    devices.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
    Ok(devices)
}

/// Name of the system default output device, if any.
pub fn default_output_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| d.name().ok())
}

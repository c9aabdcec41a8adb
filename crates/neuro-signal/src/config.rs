//! Generator and scorer configuration.

use crate::error::{SignalError, SignalResult};
use serde::{Deserialize, Serialize};

/// Configuration for the synthetic waveform generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Channel labels, in emission order.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Carrier frequency of the first channel (Hz).
    #[serde(default = "default_base_frequency_hz")]
    pub base_frequency_hz: f64,
    /// Carrier frequency increment per channel index (Hz).
    #[serde(default = "default_frequency_step_hz")]
    pub frequency_step_hz: f64,
    /// Samples per channel per tick.
    #[serde(default = "default_samples_per_tick")]
    pub samples_per_tick: usize,
    /// Logical spacing between consecutive samples (ms).
    #[serde(default = "default_sample_spacing_ms")]
    pub sample_spacing_ms: u64,
    /// Sine carrier amplitude.
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    /// Peak-to-peak width of the uniform noise band.
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    /// Per-sample probability of an impulse artifact.
    #[serde(default = "default_spike_probability")]
    pub spike_probability: f64,
    /// Peak-to-peak width of an impulse artifact.
    #[serde(default = "default_spike_amplitude")]
    pub spike_amplitude: f64,
}

fn default_channels() -> Vec<String> {
    ["Fp1", "Fp2", "F3", "F4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_base_frequency_hz() -> f64 {
    8.0
}

fn default_frequency_step_hz() -> f64 {
    2.0
}

fn default_samples_per_tick() -> usize {
    16
}

fn default_sample_spacing_ms() -> u64 {
    10
}

fn default_amplitude() -> f64 {
    0.7
}

fn default_noise_amplitude() -> f64 {
    0.4
}

fn default_spike_probability() -> f64 {
    0.003
}

fn default_spike_amplitude() -> f64 {
    6.0
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            base_frequency_hz: default_base_frequency_hz(),
            frequency_step_hz: default_frequency_step_hz(),
            samples_per_tick: default_samples_per_tick(),
            sample_spacing_ms: default_sample_spacing_ms(),
            amplitude: default_amplitude(),
            noise_amplitude: default_noise_amplitude(),
            spike_probability: default_spike_probability(),
            spike_amplitude: default_spike_amplitude(),
        }
    }
}

impl GeneratorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> SignalResult<()> {
        if self.channels.is_empty() {
            return Err(SignalError::ConfigError(
                "at least one channel is required".to_string(),
            ));
        }
        if self.channels.iter().any(|c| c.trim().is_empty()) {
            return Err(SignalError::ConfigError(
                "channel labels must not be blank".to_string(),
            ));
        }
        if self.samples_per_tick == 0 {
            return Err(SignalError::ConfigError(
                "samples_per_tick must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.spike_probability) {
            return Err(SignalError::ConfigError(format!(
                "spike_probability ({}) must be within [0, 1]",
                self.spike_probability
            )));
        }
        let magnitudes = [
            ("base_frequency_hz", self.base_frequency_hz),
            ("frequency_step_hz", self.frequency_step_hz),
            ("amplitude", self.amplitude),
            ("noise_amplitude", self.noise_amplitude),
            ("spike_amplitude", self.spike_amplitude),
        ];
        for (name, value) in magnitudes {
            if !value.is_finite() || value < 0.0 {
                return Err(SignalError::ConfigError(format!(
                    "{name} ({value}) must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }

    /// Channel labels paired with their carrier frequency.
    pub fn channel_frequencies(&self) -> Vec<(String, f64)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                (
                    label.clone(),
                    self.base_frequency_hz + idx as f64 * self.frequency_step_hz,
                )
            })
            .collect()
    }
}

/// Configuration for the RMS excursion scorer.
///
/// The score is a linear heuristic over these constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// RMS level at which the score starts rising above zero.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Scores at or below this are not emitted as ANOMALY frames.
    #[serde(default = "default_emission_threshold")]
    pub emission_threshold: f64,
    /// Lower bound applied to the peak RMS.
    #[serde(default = "default_rms_floor")]
    pub rms_floor: f64,
}

fn default_threshold() -> f64 {
    1.4
}

fn default_emission_threshold() -> f64 {
    0.02
}

fn default_rms_floor() -> f64 {
    0.0001
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            emission_threshold: default_emission_threshold(),
            rms_floor: default_rms_floor(),
        }
    }
}

impl ScorerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> SignalResult<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(SignalError::ConfigError(format!(
                "threshold ({}) must be positive",
                self.threshold
            )));
        }
        if !(0.0..1.0).contains(&self.emission_threshold) {
            return Err(SignalError::ConfigError(format!(
                "emission_threshold ({}) must be within [0, 1)",
                self.emission_threshold
            )));
        }
        if !self.rms_floor.is_finite() || self.rms_floor <= 0.0 {
            return Err(SignalError::ConfigError(format!(
                "rms_floor ({}) must be positive",
                self.rms_floor
            )));
        }
        Ok(())
    }
}

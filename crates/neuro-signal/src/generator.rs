//! Synthetic multi-channel waveform generator.
//!
//! Each channel is a sine carrier at a channel-specific frequency with
//! bounded uniform noise added to every sample. With a small fixed
//! probability a sample also receives a large impulse, modelling a transient
//! artifact. The generator keeps no state besides the channel list: output is
//! a function of the wall clock and the random source.

use crate::config::GeneratorConfig;
use crate::error::{SignalError, SignalResult};
use neuro_core::{now_ms, ChannelSample};
use rand::Rng;
use std::f64::consts::TAU;

#[derive(Debug, Clone)]
struct ChannelSpec {
    label: String,
    frequency_hz: f64,
}

/// Waveform generator.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    config: GeneratorConfig,
    channels: Vec<ChannelSpec>,
}

impl WaveformGenerator {
    /// Create a generator, validating the configuration.
    pub fn new(config: GeneratorConfig) -> SignalResult<Self> {
        config.validate()?;
        let channels = config
            .channel_frequencies()
            .into_iter()
            .map(|(label, frequency_hz)| ChannelSpec {
                label,
                frequency_hz,
            })
            .collect();
        Ok(Self { config, channels })
    }

    /// Channel labels in emission order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.label.as_str())
    }

    pub fn samples_per_tick(&self) -> usize {
        self.config.samples_per_tick
    }

    /// Generate one batch for the current wall-clock time.
    pub fn generate(&self) -> Vec<ChannelSample> {
        self.generate_at(now_ms(), &mut rand::thread_rng())
    }

    /// Generate one batch anchored at `now_ms` using `rng`.
    pub fn generate_at<R: Rng + ?Sized>(&self, now_ms: i64, rng: &mut R) -> Vec<ChannelSample> {
        let cfg = &self.config;
        self.channels
            .iter()
            .map(|channel| {
                let values = (0..cfg.samples_per_tick)
                    .map(|i| {
                        let t_ms = now_ms as f64 + (i as u64 * cfg.sample_spacing_ms) as f64;
                        let t = t_ms / 1000.0;
                        let sine = (TAU * channel.frequency_hz * t).sin();
                        let noise = (rng.gen::<f64>() - 0.5) * cfg.noise_amplitude;
                        let spike = if rng.gen_bool(cfg.spike_probability) {
                            (rng.gen::<f64>() - 0.5) * cfg.spike_amplitude
                        } else {
                            0.0
                        };
                        sine * cfg.amplitude + noise + spike
                    })
                    .collect();
                ChannelSample::new(channel.label.clone(), values)
            })
            .collect()
    }
}

/// Reject a batch containing NaN or infinite values.
pub fn ensure_finite(channels: &[ChannelSample]) -> SignalResult<()> {
    for channel in channels {
        if let Some(index) = channel.values.iter().position(|v| !v.is_finite()) {
            return Err(SignalError::NonFinite {
                label: channel.label.clone(),
                index,
            });
        }
    }
    Ok(())
}

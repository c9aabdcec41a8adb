//! Synthetic waveform generation and anomaly scoring.
//!
//! - `WaveformGenerator`: one batch of multi-channel samples per tick
//!   (sine carrier + bounded uniform noise + rare impulse artifacts)
//! - `AnomalyScorer`: linear excursion of the peak channel RMS above a
//!   threshold, normalized into `[0, 1]`
//! - `ScoreModel`: seam for swapping in a different scoring model

pub mod config;
pub mod error;
pub mod generator;
pub mod scorer;

pub use config::{GeneratorConfig, ScorerConfig};
pub use error::{SignalError, SignalResult};
pub use generator::{ensure_finite, WaveformGenerator};
pub use scorer::{AnomalyScore, AnomalyScorer, ScoreModel};

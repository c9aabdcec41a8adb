//! RMS excursion anomaly scorer.
//!
//! Limitation: this is a linear excursion-above-threshold heuristic, not a
//! statistical anomaly detector. It has no baseline, no history and no
//! per-channel calibration. A more precise model can be plugged in through
//! [`ScoreModel`] without changing the producer.

use crate::config::ScorerConfig;
use crate::error::SignalResult;
use neuro_core::ChannelSample;

/// Result of scoring one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyScore {
    /// Normalized score in `[0, 1]`.
    pub score: f64,
    /// Peak per-channel RMS (floored).
    pub max_rms: f64,
}

/// Scoring model contract: one batch in, one score out.
pub trait ScoreModel: Send + Sync {
    fn score(&self, channels: &[ChannelSample]) -> AnomalyScore;

    /// Whether a score is worth an ANOMALY frame.
    fn should_emit(&self, score: &AnomalyScore) -> bool;
}

/// Default scorer.
///
/// `score = clamp((max_rms - threshold) / (2 * threshold), 0, 1)`
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    config: ScorerConfig,
}

impl AnomalyScorer {
    pub fn new(config: ScorerConfig) -> SignalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Map a peak RMS onto `[0, 1]`. Monotonically non-decreasing.
    pub fn normalize(&self, max_rms: f64) -> f64 {
        let threshold = self.config.threshold;
        let score = (max_rms - threshold) / (threshold * 2.0);
        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, 1.0)
    }
}

impl ScoreModel for AnomalyScorer {
    fn score(&self, channels: &[ChannelSample]) -> AnomalyScore {
        let max_rms = channels
            .iter()
            .map(ChannelSample::rms)
            .fold(self.config.rms_floor, f64::max);
        AnomalyScore {
            score: self.normalize(max_rms),
            max_rms,
        }
    }

    fn should_emit(&self, score: &AnomalyScore) -> bool {
        score.score > self.config.emission_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> AnomalyScorer {
        AnomalyScorer::new(ScorerConfig::default()).unwrap()
    }

    fn flat(label: &str, level: f64, n: usize) -> ChannelSample {
        ChannelSample::new(label, vec![level; n])
    }

    #[test]
    fn test_reference_scenario() {
        // max_rms = 2.0, threshold = 1.4 -> (2.0 - 1.4) / 2.8
        let s = scorer();
        let result = s.score(&[flat("Fp1", 0.5, 16), flat("Fp2", -2.0, 16)]);
        assert!((result.max_rms - 2.0).abs() < 1e-12);
        assert!((result.score - 0.6 / 2.8).abs() < 1e-12);
        assert!((result.score - 0.214).abs() < 1e-3);
        assert!(s.should_emit(&result));
    }

    #[test]
    fn test_below_threshold_scores_zero() {
        let s = scorer();
        let result = s.score(&[flat("Fp1", 0.7, 16)]);
        assert_eq!(result.score, 0.0);
        assert!(!s.should_emit(&result));
    }

    #[test]
    fn test_score_saturates_at_one() {
        let s = scorer();
        // 3 × threshold lands a rounding step short of 1.0 in f64.
        assert!((s.normalize(1.4 * 3.0) - 1.0).abs() < 1e-12);
        assert_eq!(s.normalize(4.5), 1.0);
        assert_eq!(s.normalize(1e9), 1.0);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let s = scorer();
        let mut prev = s.normalize(0.0);
        let mut rms = 0.0;
        while rms < 10.0 {
            let score = s.normalize(rms);
            assert!((0.0..=1.0).contains(&score));
            assert!(score >= prev, "score decreased at rms={rms}");
            prev = score;
            rms += 0.01;
        }
    }

    #[test]
    fn test_empty_batch_uses_floor() {
        let s = scorer();
        let result = s.score(&[]);
        assert_eq!(result.max_rms, 0.0001);
        assert_eq!(result.score, 0.0);

        let result = s.score(&[ChannelSample::new("Fp1", vec![])]);
        assert_eq!(result.max_rms, 0.0001);
    }

    #[test]
    fn test_emission_threshold_is_strict() {
        let s = scorer();
        let at = AnomalyScore {
            score: 0.02,
            max_rms: 1.456,
        };
        assert!(!s.should_emit(&at));
    }
}

//! History configuration.

use crate::error::{HistoryError, HistoryResult};
use serde::{Deserialize, Serialize};

/// Retention window of the per-channel ring buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Seconds of samples to retain.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Expected incoming samples per second per channel.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u64,
}

fn default_retention_secs() -> u64 {
    6
}

fn default_sample_rate_hz() -> u64 {
    160
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            sample_rate_hz: default_sample_rate_hz(),
        }
    }
}

impl HistoryConfig {
    /// Buffer capacity in samples (retention × rate).
    pub fn capacity(&self) -> usize {
        self.retention_secs.saturating_mul(self.sample_rate_hz) as usize
    }

    pub fn validate(&self) -> HistoryResult<()> {
        if self.capacity() == 0 {
            return Err(HistoryError::InvalidCapacity(format!(
                "retention_secs ({}) x sample_rate_hz ({}) must be positive",
                self.retention_secs, self.sample_rate_hz
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_default_capacity() {
        assert_eq!(HistoryConfig::default().capacity(), 960);
    }

    #[test]
    fn test_zero_capacity_invalid() {
        let config: HistoryConfig = toml::from_str("retention_secs = 0").unwrap();
        assert_err!(config.validate());
    }
}

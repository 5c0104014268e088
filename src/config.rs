//! Engine configuration.
//!
//! Four knobs cover the whole engine; everything else is fixed by design:
//!
//! | Option | Bounds | Trade-off |
//! |--------|--------|-----------|
//! | `capacity` | power of two | memory vs. retention window per (thread, span) |
//! | `max_depth` | ≥ 1 | nesting depth vs. worst-case per-call cost |
//! | `trial_count` | ≥ 1 | calibration accuracy vs. startup latency |
//! | `bucket_size` | ≥ 1 | outlier-fence sensitivity vs. noise robustness |
//!
//! # Examples
//!
//! ```rust
//! use latenza::Config;
//!
//! let config = Config::new()
//!     .with_capacity(4096)
//!     .with_max_depth(32)
//!     .with_trial_count(5_000)
//!     .with_bucket_size(500);
//!
//! assert!(config.validate().is_ok());
//! ```

use thiserror::Error;

/// Error returned when a [`Config`] fails validation.
///
/// Validation happens once at engine construction, a cold path where
/// surfacing misconfiguration is cheap; nothing on the recording path can
/// fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The ring-buffer capacity is not a power of two.
    ///
    /// The store uses a masked-increment cursor, which requires a
    /// power-of-two capacity.
    #[error("capacity must be a nonzero power of two, got {0}")]
    CapacityNotPowerOfTwo(usize),

    /// The span-stack depth is zero.
    #[error("max_depth must be at least 1")]
    ZeroMaxDepth,

    /// The calibration trial count is zero.
    #[error("trial_count must be at least 1")]
    ZeroTrialCount,

    /// The statistics bucket size is zero.
    #[error("bucket_size must be at least 1")]
    ZeroBucketSize,
}

/// Engine configuration, constructed with chained `with_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Per-(thread, span) ring-buffer capacity. Must be a power of two.
    /// Once full, the store overwrites its oldest sample: retention is
    /// most-recent-N by design.
    pub capacity: usize,
    /// Maximum span-nesting depth per thread. Starts beyond this depth are
    /// silently dropped.
    pub max_depth: usize,
    /// Number of start/stop round trips per tier pair during calibration.
    ///
    /// Trials write through the normal ring buffer, so only the most recent
    /// `capacity` of them reach the estimator; a `trial_count` above
    /// `capacity` spends the surplus warming the population, not growing it.
    pub trial_count: usize,
    /// Bucket size for both the calibration estimator and the outlier fence.
    pub bucket_size: usize,
}

impl Config {
    /// Creates the default configuration: capacity 8192, depth 64,
    /// 10 000 calibration trials, bucket size 1000.
    pub const fn new() -> Self {
        Config {
            capacity: 8192,
            max_depth: 64,
            trial_count: 10_000,
            bucket_size: 1000,
        }
    }

    /// Sets the per-(thread, span) ring-buffer capacity.
    pub const fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Sets the maximum span-nesting depth.
    pub const fn with_max_depth(self, max_depth: usize) -> Self {
        Self { max_depth, ..self }
    }

    /// Sets the calibration trial count.
    pub const fn with_trial_count(self, trial_count: usize) -> Self {
        Self {
            trial_count,
            ..self
        }
    }

    /// Sets the statistics bucket size.
    pub const fn with_bucket_size(self, bucket_size: usize) -> Self {
        Self {
            bucket_size,
            ..self
        }
    }

    /// Checks every bound listed in the module docs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(ConfigError::CapacityNotPowerOfTwo(self.capacity));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        if self.trial_count == 0 {
            return Err(ConfigError::ZeroTrialCount);
        }
        if self.bucket_size == 0 {
            return Err(ConfigError::ZeroBucketSize);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = Config::new()
            .with_capacity(16)
            .with_max_depth(8)
            .with_trial_count(100)
            .with_bucket_size(10);
        assert_eq!(config.capacity, 16);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.trial_count, 100);
        assert_eq!(config.bucket_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_capacity_must_be_power_of_two() {
        let config = Config::new().with_capacity(100);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CapacityNotPowerOfTwo(100))
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = Config::new().with_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::CapacityNotPowerOfTwo(0)));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = Config::new().with_max_depth(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxDepth));
    }

    #[test]
    fn test_zero_trials_rejected() {
        let config = Config::new().with_trial_count(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTrialCount));
    }

    #[test]
    fn test_zero_bucket_rejected() {
        let config = Config::new().with_bucket_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBucketSize));
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::CapacityNotPowerOfTwo(100);
        assert!(err.to_string().contains("100"));
    }
}

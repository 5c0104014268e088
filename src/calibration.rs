//! Self-calibration: measuring the engine's own overhead.
//!
//! Every recorded delta contains not just the instrumented code but the
//! engine itself: the two counter reads, the stack push/pop, the ring-buffer
//! store. That overhead differs per (start tier, stop tier) pair (a Hard
//! read costs an order of magnitude more than a Fast one), so one offset per
//! pair is measured, plus one for pulse mode: ten values total.
//!
//! The procedure runs back-to-back empty round trips against a reserved span
//! id, through the normal sample path, each trial isolated by a full
//! serializing fence. The resulting population is contaminated upward by
//! preemption and cache misses but never downward: the floor is a valid
//! lower bound on true cost. The **bucketed-minimum-then-median** estimator
//! exploits exactly that: take each bucket's minimum (suppresses upward
//! contamination), then the median of the per-bucket minima (suppresses any
//! single anomalously fast bucket).
//!
//! The reserved ids' samples are purged afterwards so they never leak into
//! user-visible reports.

use std::time::{Duration, Instant};

use crate::clock::{self, Tier};
use crate::config::Config;
use crate::recorder::{Recorder, SpanId};
use crate::store::PairKey;

/// Reserved span id used by the tier-pair trials.
pub(crate) const CALIBRATION_ID: SpanId = "__latenza_calib";

/// Reserved span id used by the pulse trials.
pub(crate) const PULSE_ID: SpanId = "__latenza_pulse";

/// Wall-clock window used to derive the cycles-per-nanosecond ratio.
const RATIO_SLEEP: Duration = Duration::from_millis(50);

/// Whether `id` belongs to the calibration machinery and must never surface
/// in snapshots or reports.
pub(crate) fn is_reserved(id: &str) -> bool {
    id == CALIBRATION_ID || id == PULSE_ID
}

/// The ten measured overhead offsets plus the cycle/time conversion ratio.
///
/// Computed exactly once per engine, before any calibrated query; see
/// [`Engine::ensure_calibrated`](crate::Engine::ensure_calibrated).
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    offsets: [u64; PairKey::COUNT],
    cycles_per_ns: f64,
}

impl CalibrationTable {
    /// The measured overhead for one pair key, in cycles.
    ///
    /// Offsets are meaningful only per key; a mixed span is reported with a
    /// zero offset instead.
    #[inline]
    pub fn offset(&self, key: PairKey) -> u64 {
        self.offsets[key.index()]
    }

    /// Calibrated cycles per nanosecond; 1.0 when the timing window was
    /// degenerate.
    #[inline]
    pub fn cycles_per_ns(&self) -> f64 {
        self.cycles_per_ns
    }
}

/// Runs the full calibration against a dedicated recorder.
///
/// The recorder writes through the normal sample path; its reserved-id
/// stores are cleared between pair runs and after the final one.
pub(crate) fn run(config: &Config, recorder: &mut Recorder) -> CalibrationTable {
    let cycles_per_ns = measure_cycles_per_ns();

    let mut offsets = [0u64; PairKey::COUNT];
    for start in Tier::ALL {
        for stop in Tier::ALL {
            for _ in 0..config.trial_count {
                clock::fence();
                recorder.start(start, CALIBRATION_ID);
                recorder.stop(stop, CALIBRATION_ID);
                clock::fence();
            }
            let samples = recorder.drain_reserved(CALIBRATION_ID);
            offsets[PairKey::of(start, stop).index()] = bumed(&samples, config.bucket_size);
        }
    }

    for _ in 0..=config.trial_count {
        clock::fence();
        recorder.pulse(PULSE_ID);
        clock::fence();
    }
    let samples = recorder.drain_reserved(PULSE_ID);
    offsets[PairKey::PULSE.index()] = bumed(&samples, config.bucket_size);

    CalibrationTable {
        offsets,
        cycles_per_ns,
    }
}

/// Derives the cycles-per-nanosecond ratio from a fixed sleep window.
fn measure_cycles_per_ns() -> f64 {
    let wall = Instant::now();
    let c0 = clock::now(Tier::Fast);
    std::thread::sleep(RATIO_SLEEP);
    let c1 = clock::now(Tier::Fast);
    let elapsed_ns = wall.elapsed().as_nanos() as u64;
    ratio_or_neutral(c1.wrapping_sub(c0), elapsed_ns)
}

/// Cycle/ns ratio with a neutral 1.0 fallback for a degenerate window.
fn ratio_or_neutral(cycles: u64, elapsed_ns: u64) -> f64 {
    if elapsed_ns == 0 || cycles == 0 || cycles > i64::MAX as u64 {
        1.0
    } else {
        cycles as f64 / elapsed_ns as f64
    }
}

/// Bucketed-minimum-then-median estimator.
///
/// Partitions into `bucket_size` chunks, takes each chunk's minimum, then the
/// median of those minima. Falls back to the global minimum when there are
/// too few samples to fill one bucket, and to 0 for an empty population.
pub(crate) fn bumed(samples: &[u64], bucket_size: usize) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    if samples.len() < bucket_size {
        return samples.iter().copied().min().unwrap_or(0);
    }
    let mut minima: Vec<u64> = samples
        .chunks(bucket_size)
        .map(|chunk| chunk.iter().copied().min().unwrap_or(u64::MAX))
        .collect();
    minima.sort_unstable();
    let n = minima.len();
    if n % 2 == 0 {
        (minima[n / 2 - 1] + minima[n / 2]) / 2
    } else {
        minima[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bumed_empty() {
        assert_eq!(bumed(&[], 1000), 0);
    }

    #[test]
    fn test_bumed_below_one_bucket_uses_global_min() {
        assert_eq!(bumed(&[9, 3, 7], 1000), 3);
    }

    #[test]
    fn test_bumed_median_of_bucket_minima() {
        // Buckets of 3: minima are [1, 2, 3], median 2.
        let samples = [5, 1, 9, 7, 2, 8, 3, 6, 4];
        assert_eq!(bumed(&samples, 3), 2);
    }

    #[test]
    fn test_bumed_even_bucket_count_averages_middles() {
        // Minima [1, 2, 3, 4] -> (2 + 3) / 2.
        let samples = [1, 9, 2, 9, 3, 9, 4, 9];
        assert_eq!(bumed(&samples, 2), 2);
    }

    #[test]
    fn test_bumed_suppresses_contaminated_bucket() {
        // One bucket preempted (all values huge): its minimum is an outlier
        // among minima, and the median ignores it.
        let mut samples = vec![10u64; 50];
        for s in samples.iter_mut().skip(40) {
            *s = 100_000;
        }
        assert_eq!(bumed(&samples, 10), 10);
    }

    #[test]
    fn test_bumed_strictly_between_zero_and_max_for_spread_data() {
        let samples: Vec<u64> = (0..5000).map(|i| 40 + (i % 7) + if i % 997 == 0 { 900 } else { 0 }).collect();
        let estimate = bumed(&samples, 1000);
        let max = *samples.iter().max().unwrap();
        assert!(estimate > 0);
        assert!(estimate < max);
    }

    #[test]
    fn test_ratio_neutral_on_zero_elapsed() {
        assert_eq!(ratio_or_neutral(1_000_000, 0), 1.0);
    }

    #[test]
    fn test_ratio_neutral_on_wrapped_counter() {
        assert_eq!(ratio_or_neutral(u64::MAX, 1000), 1.0);
        assert_eq!(ratio_or_neutral(0, 1000), 1.0);
    }

    #[test]
    fn test_ratio_normal() {
        assert!((ratio_or_neutral(3_000_000, 1_000_000) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_measured_ratio_is_positive() {
        let ratio = measure_cycles_per_ns();
        assert!(ratio > 0.0);
    }

    #[test]
    fn test_reserved_ids() {
        assert!(is_reserved(CALIBRATION_ID));
        assert!(is_reserved(PULSE_ID));
        assert!(!is_reserved("user_span"));
    }
}

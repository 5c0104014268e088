//! Outlier rejection and descriptive statistics.
//!
//! Latency populations collected on a real OS are contaminated by events that
//! have nothing to do with the code under measurement: preemption, page
//! faults, interrupts. Those appear as samples orders of magnitude above the
//! true distribution and wreck mean, stddev and skew. At the same time a
//! *genuinely* slow sample is exactly what a latency engine exists to show,
//! so the fence must be wide.
//!
//! The cleaner sorts the population, partitions it into fixed-size buckets
//! and looks only at each bucket's maximum: scheduler noise inflates maxima,
//! so the distribution of maxima is where the contamination is visible. With
//! enough buckets the cutoff is a wide Tukey fence (Q3 + 3×IQR) over the
//! maxima; samples beyond it are counted as "bypass" and excluded, and the
//! fence is re-derived on the survivors until it stabilizes, so cleaning an
//! already-cleaned population bypasses nothing further. A cleaned result is
//! never empty for nonempty input: if the fence would reject everything, the
//! unfiltered input is used instead.

/// Minimum bucket-maxima population for the IQR fence; below this the cutoff
/// degrades to 1.5× the largest maximum.
const MIN_MAXIMA_FOR_IQR: usize = 4;

/// Tukey multiplier. 1.5 is the textbook fence; 3.0 admits everything but
/// extreme values, which is what "keep real slow samples" requires.
const TUKEY_K: f64 = 3.0;

/// Descriptive statistics for one span, in the unit requested at report time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpanStats {
    /// Samples in the cleaned population.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median; mean of the two middle values when `count` is even.
    pub median: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Fisher-Pearson skewness (third standardized moment); 0 when the
    /// deviation is ~0 or `count` ≤ 1.
    pub skew: f64,
    /// Smallest cleaned sample.
    pub min: f64,
    /// Largest cleaned sample.
    pub max: f64,
    /// `max - min`.
    pub range: f64,
    /// 99th percentile (R-7 linear interpolation).
    pub p99: f64,
    /// Samples excluded by the outlier fence.
    pub bypassed: usize,
}

/// Result of a cleaning pass: the retained samples, sorted ascending, plus
/// the bypass count.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cleaned {
    pub(crate) samples: Vec<u64>,
    pub(crate) bypassed: usize,
}

/// Applies the bucketed-maxima outlier fence.
///
/// The fence is a pure function of the sample multiset: the population is
/// sorted first and bucketed in value order, so recording order has no
/// influence on the cutoff. The fence is then re-derived on the survivors
/// until no further sample falls, which makes `clean` idempotent: cleaning
/// an already-cleaned population bypasses nothing. Never returns an empty
/// population for nonempty input.
pub(crate) fn clean(samples: Vec<u64>, bucket_size: usize) -> Cleaned {
    debug_assert!(bucket_size > 0);
    let mut kept = samples;
    kept.sort_unstable();
    let mut bypassed = 0usize;

    while let Some(cutoff) = fence_cutoff(&kept, bucket_size) {
        // Sorted input: everything past the partition point is beyond the
        // fence.
        let keep_len = kept.partition_point(|&s| (s as f64) <= cutoff);
        if keep_len == kept.len() {
            break;
        }
        if keep_len == 0 {
            // The fence rejected everything; report the unfiltered data
            // rather than nothing.
            break;
        }
        bypassed += kept.len() - keep_len;
        kept.truncate(keep_len);
    }

    Cleaned {
        samples: kept,
        bypassed,
    }
}

/// Computes the fence cutoff from per-bucket maxima, or `None` when the
/// population is too small to bucket at all.
///
/// `samples` must be sorted ascending, so each bucket's maximum is its last
/// element and the maxima come out already ordered. A trailing bucket
/// shorter than half `bucket_size` is unrepresentative and excluded from the
/// maxima (its samples are still subject to the fence).
fn fence_cutoff(samples: &[u64], bucket_size: usize) -> Option<f64> {
    debug_assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    let maxima: Vec<f64> = samples
        .chunks(bucket_size)
        .filter(|chunk| chunk.len() * 2 >= bucket_size)
        .map(|chunk| chunk[chunk.len() - 1] as f64)
        .collect();

    if maxima.is_empty() {
        return None;
    }
    if maxima.len() < MIN_MAXIMA_FOR_IQR {
        return Some(maxima[maxima.len() - 1] * 1.5);
    }

    let q1 = quantile(&maxima, 0.25);
    let q3 = quantile(&maxima, 0.75);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        Some(q3 * 1.5)
    } else {
        Some(q3 + TUKEY_K * iqr)
    }
}

/// R-7 quantile (linear interpolation) over an ascending-sorted slice.
pub(crate) fn quantile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&p));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let frac = h - h.floor();
    if lo >= n - 1 {
        return sorted[n - 1];
    }
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

/// Computes descriptive statistics over an ascending-sorted population.
pub(crate) fn describe(sorted: &[f64], bypassed: usize) -> SpanStats {
    let n = sorted.len();
    if n == 0 {
        return SpanStats {
            bypassed,
            ..SpanStats::default()
        };
    }

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let mut variance_sum = 0.0;
    let mut skew_sum = 0.0;
    for &s in sorted {
        let diff = s - mean;
        variance_sum += diff * diff;
        skew_sum += diff * diff * diff;
    }
    let stddev = (variance_sum / n as f64).sqrt();
    let skew = if n <= 1 || stddev < 1e-9 {
        0.0
    } else {
        (skew_sum / n as f64) / (stddev * stddev * stddev)
    };

    let min = sorted[0];
    let max = sorted[n - 1];
    SpanStats {
        count: n,
        mean,
        median,
        stddev,
        skew,
        min,
        max,
        range: max - min,
        p99: quantile(sorted, 0.99),
        bypassed,
    }
}

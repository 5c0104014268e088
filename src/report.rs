//! Report types: the engine's query-side output.
//!
//! A [`Report`] is produced by [`Engine::report`](crate::Engine::report) and
//! carries one [`SpanReport`] per span that has recorded at least one sample,
//! along two independent axes: the [`Unit`] the statistics are expressed in
//! and the correction [`Mode`] applied before cleaning.
//!
//! Rendering a report as text is presentation, not analysis; see the
//! feature-gated observers for that.

use crate::recorder::SpanId;
use crate::stats::SpanStats;
use crate::store::PairKey;

/// Unit the report's statistics are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    /// Native hardware cycles (whatever the counter counts).
    #[default]
    Cycles,
    /// Wall-clock nanoseconds, via the calibrated cycles-per-ns ratio.
    Time,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Cycles => write!(f, "cycles"),
            Unit::Time => write!(f, "ns"),
        }
    }
}

/// Overhead-correction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Samples as recorded, engine overhead included.
    #[default]
    Raw,
    /// The per-pair calibration offset subtracted from every sample,
    /// saturating at zero. Mixed spans receive no correction.
    Calibrated,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Raw => write!(f, "raw"),
            Mode::Calibrated => write!(f, "calibrated"),
        }
    }
}

/// Statistics for one span.
#[derive(Debug, Clone)]
pub struct SpanReport {
    /// The span id.
    pub id: SpanId,
    /// The single pair key all of this span's samples were recorded under,
    /// or `None` when the span is mixed (recorded under more than one key).
    /// A mixed span is never offset-corrected.
    pub key: Option<PairKey>,
    /// The cleaned descriptive statistics.
    pub stats: SpanStats,
}

/// A full engine report: one entry per span with samples.
#[derive(Debug, Clone)]
pub struct Report {
    /// Unit the statistics are expressed in.
    pub unit: Unit,
    /// Correction mode applied before cleaning.
    pub mode: Mode,
    /// Per-span statistics, sorted by span id.
    pub spans: Vec<SpanReport>,
}

impl Report {
    /// Finds a span's report by id.
    pub fn get(&self, id: &str) -> Option<&SpanReport> {
        self.spans.iter().find(|s| s.id == id)
    }

    /// Number of spans in the report.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True when no span has recorded any sample.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get() {
        let report = Report {
            unit: Unit::Cycles,
            mode: Mode::Raw,
            spans: vec![SpanReport {
                id: "a",
                key: None,
                stats: SpanStats::default(),
            }],
        };
        assert!(report.get("a").is_some());
        assert!(report.get("b").is_none());
        assert_eq!(report.len(), 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Unit::Cycles.to_string(), "cycles");
        assert_eq!(Unit::Time.to_string(), "ns");
        assert_eq!(Mode::Raw.to_string(), "raw");
        assert_eq!(Mode::Calibrated.to_string(), "calibrated");
    }
}

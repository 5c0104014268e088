//! Snapshot types for serializing report state.
//!
//! A [`Report`] borrows its span ids for the engine's lifetime; a snapshot
//! owns everything, so it can be stored, sent over an API, or handed to any
//! serde-compatible format.
//!
//! # Feature Flag
//!
//! This module requires the `serde` feature:
//!
//! ```toml
//! [dependencies]
//! latenza = { version = "0.1", features = ["serde"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use latenza::snapshot::ReportSnapshot;
//! use latenza::{Engine, Mode, Unit};
//!
//! let engine = Engine::new();
//! // ... record spans ...
//! let report = engine.report(Unit::Time, Mode::Calibrated);
//! let snapshot = ReportSnapshot::from_report(&report);
//!
//! let json = serde_json::to_string(&snapshot).unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::report::{Mode, Report, Unit};
use crate::stats::SpanStats;

/// A snapshot of one span's statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanSnapshot {
    /// The span id.
    pub name: String,
    /// The pair key the span's samples were recorded under, rendered as
    /// `"fast/hard"` or `"pulse"`; `None` when the span is mixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// The span's cleaned statistics.
    pub stats: SpanStats,
}

/// An owned, serializable capture of a full [`Report`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSnapshot {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    /// Unit the statistics are expressed in.
    pub unit: Unit,
    /// Correction mode the statistics were produced under.
    pub mode: Mode,
    /// Per-span statistics.
    pub spans: Vec<SpanSnapshot>,
}

impl ReportSnapshot {
    /// Captures a report into an owned snapshot.
    pub fn from_report(report: &Report) -> Self {
        ReportSnapshot {
            timestamp_ms: None,
            unit: report.unit,
            mode: report.mode,
            spans: report
                .spans
                .iter()
                .map(|span| SpanSnapshot {
                    name: span.id.to_string(),
                    key: span.key.map(|k| k.to_string()),
                    stats: span.stats,
                })
                .collect(),
        }
    }

    /// Captures a report with a timestamp attached.
    pub fn with_timestamp(report: &Report, timestamp_ms: u64) -> Self {
        ReportSnapshot {
            timestamp_ms: Some(timestamp_ms),
            ..Self::from_report(report)
        }
    }

    /// Finds a span's snapshot by name.
    pub fn get(&self, name: &str) -> Option<&SpanSnapshot> {
        self.spans.iter().find(|s| s.name == name)
    }
}

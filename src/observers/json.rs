//! JSON observer for serializing reports.
//!
//! This module provides [`JsonObserver`], which serializes a [`Report`]
//! (through its owned [`ReportSnapshot`]) to JSON using serde.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! latenza = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use latenza::observers::json::JsonObserver;
//! use latenza::{Engine, Mode, Unit};
//!
//! let engine = Engine::new();
//! // ... record spans ...
//! let report = engine.report(Unit::Cycles, Mode::Raw);
//!
//! let json = JsonObserver::new().pretty(true).to_json(&report)?;
//! println!("{}", json);
//! ```

use crate::observers::Result;
use crate::report::Report;
use crate::snapshot::ReportSnapshot;

/// An observer that serializes a report to JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObserver {
    pretty: bool,
    timestamp_ms: Option<u64>,
}

impl JsonObserver {
    /// Creates a JSON observer producing compact output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }

    /// Attaches a timestamp (milliseconds since Unix epoch) to the output.
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Serializes the report.
    pub fn to_json(&self, report: &Report) -> Result<String> {
        let snapshot = match self.timestamp_ms {
            Some(ts) => ReportSnapshot::with_timestamp(report, ts),
            None => ReportSnapshot::from_report(report),
        };
        let json = if self.pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Mode, SpanReport, Unit};
    use crate::stats::SpanStats;

    fn sample_report() -> Report {
        Report {
            unit: Unit::Cycles,
            mode: Mode::Raw,
            spans: vec![SpanReport {
                id: "decode",
                key: None,
                stats: SpanStats {
                    count: 10,
                    mean: 50.0,
                    ..SpanStats::default()
                },
            }],
        }
    }

    #[test]
    fn test_compact_output() {
        let json = JsonObserver::new().to_json(&sample_report()).unwrap();
        assert!(json.contains(r#""name":"decode""#));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_pretty_output() {
        let json = JsonObserver::new()
            .pretty(true)
            .to_json(&sample_report())
            .unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("decode"));
    }

    #[test]
    fn test_timestamp_included() {
        let json = JsonObserver::new()
            .with_timestamp(1234567890)
            .to_json(&sample_report())
            .unwrap();
        assert!(json.contains("1234567890"));
    }

    #[test]
    fn test_round_trip() {
        let json = JsonObserver::new().to_json(&sample_report()).unwrap();
        let back: ReportSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.spans[0].name, "decode");
        assert_eq!(back.spans[0].stats.count, 10);
    }
}

//! Table observer for pretty-printing reports.
//!
//! This module provides [`TableObserver`], which renders a [`Report`] as a
//! formatted table using the `tabled` crate, one row per span.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! latenza = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use latenza::observers::table::{TableObserver, TableStyle};
//! use latenza::{Engine, Mode, Unit};
//!
//! let engine = Engine::new();
//! // ... record spans ...
//! let report = engine.report(Unit::Time, Mode::Calibrated);
//!
//! let observer = TableObserver::new()
//!     .with_style(TableStyle::Rounded)
//!     .with_title("latency report");
//! println!("{}", observer.render(&report));
//! // latency report
//! // ╭───────┬───────────┬─────────┬──────────┬──────────┬─────────┬───────┬─────────┬──────────┬─────────┬────────╮
//! // │ Span  │ Key       │ Samples │ Mean     │ Median   │ StdDev  │ Skew  │ Min     │ Max      │ P99     │ Bypass │
//! // ├───────┼───────────┼─────────┼──────────┼──────────┼─────────┼───────┼─────────┼──────────┼─────────┼────────┤
//! // │ parse │ fast/fast │ 100000  │ 1.24 us  │ 1.18 us  │ 0.21 us │ 0.87  │ 0.98 us │ 2.43 us  │ 2.21 us │ 12     │
//! // ╰───────┴───────────┴─────────┴──────────┴──────────┴─────────┴───────┴─────────┴──────────┴─────────┴────────╯
//! ```

use tabled::{settings::Style, Table, Tabled};

use crate::report::{Report, Unit};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Internal row representation for tabled.
#[derive(Tabled)]
struct SpanRow {
    #[tabled(rename = "Span")]
    span: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Median")]
    median: String,
    #[tabled(rename = "StdDev")]
    stddev: String,
    #[tabled(rename = "Skew")]
    skew: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "P99")]
    p99: String,
    #[tabled(rename = "Bypass")]
    bypass: usize,
}

/// An observer that renders a report as a formatted table.
///
/// Cycle statistics print as plain numbers; time statistics print with a
/// human unit (ns, us or ms) chosen per value, the way a latency report is
/// actually read.
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    style: TableStyle,
    title: Option<String>,
}

impl TableObserver {
    /// Creates a table observer with the default [`TableStyle::Rounded`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets an optional title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Renders the report.
    pub fn render(&self, report: &Report) -> String {
        let rows: Vec<SpanRow> = report
            .spans
            .iter()
            .map(|span| {
                let stats = &span.stats;
                SpanRow {
                    span: span.id.to_string(),
                    key: span
                        .key
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "mixed".to_string()),
                    samples: stats.count,
                    mean: format_value(stats.mean, report.unit),
                    median: format_value(stats.median, report.unit),
                    stddev: format_value(stats.stddev, report.unit),
                    skew: format!("{:.2}", stats.skew),
                    min: format_value(stats.min, report.unit),
                    max: format_value(stats.max, report.unit),
                    p99: format_value(stats.p99, report.unit),
                    bypass: stats.bypassed,
                }
            })
            .collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        match &self.title {
            Some(title) => format!("{title}\n{table}"),
            None => table.to_string(),
        }
    }

    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }
}

/// Formats one statistic: plain for cycles, human time units for time.
fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Cycles => format!("{value:.0}"),
        Unit::Time => format_time(value),
    }
}

/// Formats nanoseconds with the most readable unit.
fn format_time(ns: f64) -> String {
    if ns < 1_000.0 {
        format!("{ns:.2} ns")
    } else if ns < 1e6 {
        format!("{:.2} us", ns / 1_000.0)
    } else {
        format!("{:.2} ms", ns / 1e6)
    }
}

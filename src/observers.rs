//! Observer implementations for presenting engine reports.
//!
//! The core's contract ends at [`Report`](crate::Report): turning statistics
//! into text is presentation, so each renderer lives here behind a feature
//! flag:
//!
//! - [`table`] - Pretty-print a report as a table using the `tabled` crate
//! - [`json`] - Serialize a report snapshot to JSON
//!
//! # Unified Error Handling
//!
//! All observers use a unified [`ObserverError`] type, allowing you to switch
//! between observers without changing error handling code.
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module (implies `serde`)
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust,ignore
//! use latenza::{Engine, Mode, Unit};
//! use latenza::observers::Result;
//!
//! fn print_report(engine: &Engine) -> Result<()> {
//!     let report = engine.report(Unit::Time, Mode::Calibrated);
//!
//!     #[cfg(feature = "table")]
//!     {
//!         use latenza::observers::table::TableObserver;
//!         println!("{}", TableObserver::new().render(&report));
//!     }
//!
//!     #[cfg(feature = "json")]
//!     {
//!         use latenza::observers::json::JsonObserver;
//!         println!("{}", JsonObserver::new().pretty(true).to_json(&report)?);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;

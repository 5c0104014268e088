//! # Latenza - Cycle-Accurate, Self-Calibrating Latency Spans
//!
//! A Rust library for measuring the duration of arbitrary code spans, in
//! hardware clock cycles, across many threads, with measurement cost low
//! enough not to distort the phenomena being measured.
//!
//! ## The Problem
//!
//! Measuring nanosecond-scale code with microsecond-scale tools produces
//! numbers about the tools. Three separate effects conspire against naive
//! instrumentation:
//!
//! 1. **Measurement overhead**: two clock reads plus bookkeeping can cost
//!    more than the code between them. A profiler that allocates, locks, or
//!    syscalls on the hot path measures itself.
//! 2. **CPU reordering**: an unserialized counter read can drift across the
//!    instructions it is supposed to bracket, biasing very short spans.
//! 3. **Scheduler noise**: preemption, page faults and interrupts inject
//!    samples orders of magnitude above the true distribution, wrecking
//!    mean, stddev and skew, while genuinely slow samples are exactly what
//!    a latency tool exists to show.
//!
//! ## The Solution
//!
//! Latenza attacks all three:
//!
//! 1. The recording path is **per-thread, lock-free and allocation-free**:
//!    a fixed-depth span stack and a fixed-capacity ring of atomic slots per
//!    (thread, span). Start/stop cost is a handful of cycles on top of the
//!    counter read itself.
//! 2. Three escalating [`Tier`]s trade read cost against ordering
//!    protection, and a **self-calibration** pass measures the engine's own
//!    overhead per (start tier, stop tier) pair (ten offsets total) with a
//!    noise-robust bucketed-minimum-then-median estimator, then subtracts it
//!    from calibrated reports.
//! 3. Reported statistics pass through a **bucketed-maxima Tukey fence**
//!    wide enough to keep real tail latency while rejecting scheduler
//!    spikes, which are counted separately as "bypass".
//!
//! ### Design Principles
//!
//! 1. **Single writer per buffer**: each ring buffer is written by exactly
//!    one thread; cross-thread reads are racy by contract and tolerate torn
//!    cursors or duplicated entries. No synchronization on the write path.
//! 2. **Explicit lifecycle**: the [`Engine`] is constructed once and shared
//!    explicitly; per-thread [`Recorder`]s come from a factory and are
//!    threaded through by the caller. Recorder storage lives as long as the
//!    engine: there is no teardown path, and that is deliberate.
//! 3. **Silent hot-path faults**: starting past the depth limit drops the
//!    push; stopping on an empty stack is a no-op. Signaling would cost more
//!    than any caller could act on mid-measurement. The `strict` feature
//!    turns these into panics for test suites.
//! 4. **Aggregation on read**: merging, offset correction and statistics run
//!    at query time, under the registry lock, on explicitly cold paths.
//!
//! ## Quick Start
//!
//! ```rust
//! use latenza::{Engine, Mode, Tier, Unit};
//!
//! let engine = Engine::new();
//!
//! // One recorder per thread, threaded through the instrumented code.
//! let mut rec = engine.recorder();
//!
//! for _ in 0..10_000 {
//!     rec.start(Tier::Fast, "hot_loop");
//!     // ... code under measurement ...
//!     rec.stop(Tier::Fast, "hot_loop");
//!
//!     rec.pulse("iteration"); // delta since the previous pulse
//! }
//!
//! // Cold path: merge every thread's samples, reject scheduler outliers,
//! // compute statistics.
//! let report = engine.report(Unit::Cycles, Mode::Raw);
//! if let Some(span) = report.get("hot_loop") {
//!     println!("mean {:.1} cycles over {} samples ({} bypassed)",
//!         span.stats.mean, span.stats.count, span.stats.bypassed);
//! }
//! ```
//!
//! ## Timestamp Tiers
//!
//! | Tier | Cost | Protection |
//! |------|------|------------|
//! | [`Tier::Fast`] | cheapest | none: the read may reorder with neighbors |
//! | [`Tier::Mid`] | moderate | prior instructions retire before the read |
//! | [`Tier::Hard`] | highest | reordering bounded from both directions |
//!
//! Start and stop may use different tiers; all nine pairings are legal and
//! each is calibrated separately. A span recorded under more than one
//! pairing is "mixed" and reported uncorrected.
//!
//! ## Thread Safety
//!
//! [`Engine`] is `Send + Sync` and meant to be shared via `Arc`. A
//! [`Recorder`] belongs to one thread. Reports may run concurrently with
//! active recorders: readers see benignly stale data, never corruption.
//!
//! ## Memory Usage
//!
//! Per (thread, span id): `capacity × 8` bytes of samples plus a padded
//! cursor, allocated on first use and retained for the engine's lifetime.
//! The ring keeps the most recent `capacity` samples by overwriting the
//! oldest, so memory is bounded no matter how long the process runs.
//!
//! ## Observers
//!
//! Report rendering is presentation, not analysis, and lives behind feature
//! flags:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Pretty-print a report as a table |
//! | `json` | [`observers::json`] | Serialize a report snapshot to JSON |
//! | `serde` | [`snapshot`] | Owned, serializable report snapshots |
//! | `full` | All of the above | |

pub mod calibration;
pub mod clock;
pub mod config;
pub mod engine;
pub mod observers;
pub mod recorder;
pub mod report;
pub mod stats;
pub mod store;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use calibration::CalibrationTable;
pub use clock::Tier;
pub use config::{Config, ConfigError};
pub use engine::Engine;
pub use recorder::{Recorder, SpanId};
pub use report::{Mode, Report, SpanReport, Unit};
pub use stats::SpanStats;
pub use store::PairKey;

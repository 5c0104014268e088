//! The engine: registry, calibration guard, and cross-thread aggregation.
//!
//! An [`Engine`] is constructed explicitly once at process start and shared
//! (typically behind an `Arc`) with every piece of code that records spans;
//! there is no implicit global. Its lifetime is the process's: recorder
//! storage registered with an engine is never torn down.
//!
//! The registry mutex is taken in exactly two situations, both cold:
//! registration of a new recorder, and whole-process reads (aggregation and
//! calibration). It is never touched on the per-call recording path.
//!
//! # Examples
//!
//! ```rust
//! use latenza::{Engine, Mode, Tier, Unit};
//!
//! let engine = Engine::new();
//! let mut rec = engine.recorder();
//!
//! for _ in 0..100 {
//!     rec.start(Tier::Fast, "parse");
//!     rec.stop(Tier::Fast, "parse");
//! }
//!
//! let report = engine.report(Unit::Cycles, Mode::Raw);
//! let parse = report.get("parse").unwrap();
//! assert_eq!(parse.stats.count + parse.stats.bypassed, 100);
//! ```

use std::sync::{Arc, Mutex, OnceLock};

use crate::calibration::{self, CalibrationTable};
use crate::config::{Config, ConfigError};
use crate::recorder::{Recorder, SpanId, ThreadSlot};
use crate::report::{Mode, Report, SpanReport, Unit};
use crate::stats;
use crate::store::PairKey;

/// Process-wide measurement engine: registry of per-thread recorders,
/// one-shot calibration, and the aggregation/query side.
pub struct Engine {
    config: Config,
    slots: Mutex<Vec<Arc<ThreadSlot>>>,
    calibration: OnceLock<CalibrationTable>,
}

impl Engine {
    /// Creates an engine with the default [`Config`].
    pub fn new() -> Self {
        Engine {
            config: Config::new(),
            slots: Mutex::new(Vec::new()),
            calibration: OnceLock::new(),
        }
    }

    /// Creates an engine with a custom, validated configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use latenza::{Config, Engine};
    ///
    /// let engine = Engine::with_config(Config::new().with_capacity(4096)).unwrap();
    /// assert_eq!(engine.config().capacity, 4096);
    ///
    /// assert!(Engine::with_config(Config::new().with_capacity(100)).is_err());
    /// ```
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Engine {
            config,
            slots: Mutex::new(Vec::new()),
            calibration: OnceLock::new(),
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates and registers a recorder for the calling thread.
    ///
    /// Call this once per thread and thread the recorder through the code
    /// being instrumented; the registration takes the registry lock, so keep
    /// it off any measured path. The recorder's storage stays registered (and
    /// readable by reports) for the engine's lifetime, even after the
    /// recorder itself is dropped.
    pub fn recorder(&self) -> Recorder {
        let slot = Arc::new(ThreadSlot::default());
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&slot));
        Recorder::new(slot, self.config.capacity, self.config.max_depth)
    }

    /// Runs calibration exactly once and returns the table.
    ///
    /// Idempotent: concurrent callers block until the first run completes,
    /// then every caller gets the same table. The run takes roughly the
    /// ratio-measurement sleep plus `trial_count` round trips per pair key.
    pub fn ensure_calibrated(&self) -> &CalibrationTable {
        self.calibration.get_or_init(|| {
            let mut recorder = self.recorder();
            calibration::run(&self.config, &mut recorder)
        })
    }

    /// Raw merged cycle samples for one span across every registered
    /// recorder: uncalibrated, uncleaned, unsorted.
    ///
    /// A never-recorded (or reserved) id yields an empty vector.
    pub fn snapshot(&self, id: &str) -> Vec<u64> {
        if calibration::is_reserved(id) {
            return Vec::new();
        }
        self.extract_raw(id).0
    }

    /// Builds the full statistics report along the requested axes.
    ///
    /// Calibrated mode and the time unit both force
    /// [`ensure_calibrated`](Engine::ensure_calibrated) first; a raw
    /// cycles report never triggers calibration.
    pub fn report(&self, unit: Unit, mode: Mode) -> Report {
        let table = if mode == Mode::Calibrated || unit == Unit::Time {
            Some(self.ensure_calibrated())
        } else {
            None
        };

        let mut spans = Vec::new();
        for id in self.span_ids() {
            let (mut samples, mask) = self.extract_raw(id);
            if samples.is_empty() {
                continue;
            }
            let key = single_key(mask);

            let offset = match (mode, key, table) {
                (Mode::Calibrated, Some(key), Some(table)) => table.offset(key),
                // Mixed spans get no correction: their overhead is ambiguous.
                _ => 0,
            };
            if offset > 0 {
                for sample in samples.iter_mut() {
                    *sample = sample.saturating_sub(offset);
                }
            }

            let cleaned = stats::clean(samples, self.config.bucket_size);
            let scale = match (unit, table) {
                (Unit::Time, Some(table)) => table.cycles_per_ns(),
                _ => 1.0,
            };
            let sorted: Vec<f64> = cleaned.samples.iter().map(|&s| s as f64 / scale).collect();
            spans.push(SpanReport {
                id,
                key,
                stats: stats::describe(&sorted, cleaned.bypassed),
            });
        }

        Report { unit, mode, spans }
    }

    /// Merges one id's nonzero samples and pair mask across all slots.
    fn extract_raw(&self, id: &str) -> (Vec<u64>, u16) {
        let mut samples = Vec::new();
        let mut mask = 0u16;
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for slot in slots.iter() {
            let series = slot.series.lock().unwrap_or_else(|e| e.into_inner());
            for s in series.iter() {
                if s.id == id {
                    s.store.collect_nonzero(&mut samples);
                    mask |= s.store.pair_mask();
                }
            }
        }
        (samples, mask)
    }

    /// Every non-reserved span id seen by any recorder, sorted.
    fn span_ids(&self) -> Vec<SpanId> {
        let mut ids: Vec<SpanId> = Vec::new();
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for slot in slots.iter() {
            let series = slot.series.lock().unwrap_or_else(|e| e.into_inner());
            for s in series.iter() {
                if !calibration::is_reserved(s.id) && !ids.contains(&s.id) {
                    ids.push(s.id);
                }
            }
        }
        drop(slots);
        ids.sort_unstable();
        ids
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field(
                "recorders",
                &self.slots.lock().map(|s| s.len()).unwrap_or(0),
            )
            .field("calibrated", &self.calibration.get().is_some())
            .finish()
    }
}

/// The single key in `mask`, or `None` when the mask is mixed or empty.
fn single_key(mask: u16) -> Option<PairKey> {
    if mask.count_ones() != 1 {
        return None;
    }
    PairKey::all().find(|key| (mask >> key.index()) & 1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Tier;
    use std::thread;

    /// Small calibration so tests stay fast. Trials deliberately exceed
    /// capacity: the estimator sees the most recent ring-full of them.
    fn test_engine() -> Engine {
        Engine::with_config(
            Config::new()
                .with_capacity(1024)
                .with_trial_count(2000)
                .with_bucket_size(200),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_id_yields_empty() {
        let engine = Engine::new();
        assert!(engine.snapshot("never_recorded").is_empty());
        let report = engine.report(Unit::Cycles, Mode::Raw);
        assert!(report.get("never_recorded").is_none());
    }

    #[test]
    fn test_snapshot_merges_recorders() {
        let engine = Engine::new();
        let mut a = engine.recorder();
        let mut b = engine.recorder();
        for _ in 0..5 {
            a.start(Tier::Fast, "merge");
            a.stop(Tier::Fast, "merge");
        }
        for _ in 0..3 {
            b.start(Tier::Fast, "merge");
            b.stop(Tier::Fast, "merge");
        }
        assert_eq!(engine.snapshot("merge").len(), 8);
    }

    #[test]
    fn test_cross_thread_merge() {
        let engine = Arc::new(Engine::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let mut rec = engine.recorder();
                for _ in 0..50 {
                    rec.start(Tier::Fast, "threaded");
                    rec.stop(Tier::Fast, "threaded");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(engine.snapshot("threaded").len(), 200);
    }

    #[test]
    fn test_raw_report_counts() {
        let engine = Engine::new();
        let mut rec = engine.recorder();
        for _ in 0..100 {
            rec.start(Tier::Mid, "work");
            rec.stop(Tier::Mid, "work");
        }
        let report = engine.report(Unit::Cycles, Mode::Raw);
        let span = report.get("work").unwrap();
        assert_eq!(span.stats.count + span.stats.bypassed, 100);
        assert_eq!(span.key, Some(PairKey::of(Tier::Mid, Tier::Mid)));
        assert!(span.stats.mean >= 1.0);
        assert!(span.stats.min >= 1.0);
        assert!(span.stats.max >= span.stats.min);
    }

    #[test]
    fn test_report_sorted_by_id() {
        let engine = Engine::new();
        let mut rec = engine.recorder();
        for id in ["zeta", "alpha", "mid"] {
            rec.start(Tier::Fast, id);
            rec.stop(Tier::Fast, id);
        }
        let report = engine.report(Unit::Cycles, Mode::Raw);
        let ids: Vec<&str> = report.spans.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_mixed_span_has_no_key_and_no_correction() {
        let engine = test_engine();
        let mut rec = engine.recorder();
        for _ in 0..20 {
            rec.start(Tier::Fast, "mixed");
            rec.stop(Tier::Fast, "mixed");
            rec.start(Tier::Hard, "mixed");
            rec.stop(Tier::Hard, "mixed");
        }
        let raw = engine.report(Unit::Cycles, Mode::Raw);
        let calibrated = engine.report(Unit::Cycles, Mode::Calibrated);
        let raw_span = raw.get("mixed").unwrap();
        let cal_span = calibrated.get("mixed").unwrap();
        assert_eq!(raw_span.key, None);
        // Zero offset subtracted: identical statistics either way.
        assert_eq!(raw_span.stats, cal_span.stats);
    }

    #[test]
    fn test_calibration_runs_once() {
        let engine = Arc::new(test_engine());
        let first = engine.ensure_calibrated() as *const CalibrationTable;
        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                engine.ensure_calibrated() as *const CalibrationTable as usize
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first as usize);
        }
    }

    #[test]
    fn test_calibration_offsets_positive() {
        let engine = test_engine();
        let table = engine.ensure_calibrated();
        for key in PairKey::all() {
            assert!(table.offset(key) > 0, "zero offset for {key}");
        }
        assert!(table.cycles_per_ns() > 0.0);
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_calibration_offsets_monotonic_in_tier() {
        let engine = test_engine();
        let table = engine.ensure_calibrated();
        let fast = table.offset(PairKey::of(Tier::Fast, Tier::Fast));
        let hard = table.offset(PairKey::of(Tier::Hard, Tier::Hard));
        assert!(hard >= fast, "hard/hard {hard} < fast/fast {fast}");
    }

    #[test]
    fn test_calibration_ids_never_surface() {
        let engine = test_engine();
        engine.ensure_calibrated();
        let report = engine.report(Unit::Cycles, Mode::Raw);
        assert!(report.is_empty());
        assert!(engine.snapshot("__latenza_calib").is_empty());
        assert!(engine.snapshot("__latenza_pulse").is_empty());
    }

    #[test]
    fn test_calibrated_report_subtracts_offset() {
        let engine = test_engine();
        let mut rec = engine.recorder();
        for _ in 0..500 {
            rec.start(Tier::Fast, "tight");
            rec.stop(Tier::Fast, "tight");
        }
        let raw = engine.report(Unit::Cycles, Mode::Raw);
        let calibrated = engine.report(Unit::Cycles, Mode::Calibrated);
        let raw_mean = raw.get("tight").unwrap().stats.mean;
        let cal_mean = calibrated.get("tight").unwrap().stats.mean;
        assert!(cal_mean <= raw_mean);
    }

    #[test]
    fn test_time_unit_scales_by_ratio() {
        let engine = test_engine();
        let mut rec = engine.recorder();
        for _ in 0..100 {
            rec.start(Tier::Fast, "scaled");
            rec.stop(Tier::Fast, "scaled");
        }
        let ratio = engine.ensure_calibrated().cycles_per_ns();
        let cycles = engine.report(Unit::Cycles, Mode::Raw);
        let time = engine.report(Unit::Time, Mode::Raw);
        let cycles_mean = cycles.get("scaled").unwrap().stats.mean;
        let time_mean = time.get("scaled").unwrap().stats.mean;
        assert!((time_mean - cycles_mean / ratio).abs() < 1e-6 * cycles_mean.max(1.0));
    }

    #[test]
    fn test_pulse_through_engine() {
        let engine = Engine::new();
        let mut rec = engine.recorder();
        rec.pulse("beat");
        assert!(engine.snapshot("beat").is_empty());
        rec.pulse("beat");
        assert_eq!(engine.snapshot("beat").len(), 1);
        let report = engine.report(Unit::Cycles, Mode::Raw);
        assert_eq!(report.get("beat").unwrap().key, Some(PairKey::PULSE));
    }
}

//! Per-thread span recording: the hot path.
//!
//! A [`Recorder`] is the per-thread context: it owns the span stack, the
//! id → store lookup and the pulse state for one thread. It is created
//! through [`Engine::recorder`](crate::Engine::recorder), which registers its
//! shared half (a [`ThreadSlot`]) with the engine exactly once; the caller
//! then threads the recorder through the code it instruments. Creation and
//! registration are explicit so the lifecycle is visible: a recorder's
//! storage is never torn down, it lives as long as the engine does.
//!
//! # Cost model
//!
//! Steady-state [`start`](Recorder::start) / [`stop`](Recorder::stop) /
//! [`pulse`](Recorder::pulse) take no locks, allocate nothing, and run in
//! constant time: a bounds check, a couple of plain stores, one counter read,
//! one ring-buffer push. The only cold path is the first call for a new span
//! id on this thread, which allocates that id's ring buffer and appends it to
//! the slot under a short mutex.
//!
//! # Silent-drop contract
//!
//! Starting beyond `max_depth` drops the push; stopping on an empty stack is
//! a no-op. Signaling either would cost more than any caller could usefully
//! act on mid-measurement. The `strict` cargo feature turns both (and a
//! stop-id mismatch) into panics for test suites.

use std::sync::{Arc, Mutex};

use crate::clock::{self, Tier};
use crate::store::{PairKey, SampleStore};

/// A stable span token.
///
/// Equality is content equality: the same literal used at two call sites
/// always refers to the same span.
pub type SpanId = &'static str;

/// One registered series: a span id and its ring buffer, visible to the
/// aggregator.
pub(crate) struct SharedSeries {
    pub(crate) id: SpanId,
    pub(crate) store: Arc<SampleStore>,
}

/// The shared half of a recorder, held by the engine's registry.
///
/// The mutex guards only the series *list* (taken on first use of a new id
/// and by the aggregator); the stores themselves are written lock-free.
#[derive(Default)]
pub(crate) struct ThreadSlot {
    pub(crate) series: Mutex<Vec<SharedSeries>>,
}

/// One in-flight span on the stack.
#[derive(Clone, Copy)]
struct SpanFrame {
    start: u64,
    tier: Tier,
    /// Index into `Recorder::series`, resolved at start so stop is O(1).
    series: usize,
    #[cfg(feature = "strict")]
    id: SpanId,
}

/// Recorder-local view of one span id.
struct LocalSeries {
    id: SpanId,
    store: Arc<SampleStore>,
    /// Previous pulse timestamp; 0 means "not yet initialized".
    last_pulse: u64,
}

/// Per-thread span recorder. Not `Sync`: one recorder per thread, threaded
/// through by the caller.
pub struct Recorder {
    frames: Vec<SpanFrame>,
    depth: usize,
    series: Vec<LocalSeries>,
    slot: Arc<ThreadSlot>,
    capacity: usize,
}

impl Recorder {
    pub(crate) fn new(slot: Arc<ThreadSlot>, capacity: usize, max_depth: usize) -> Self {
        let frames = vec![
            SpanFrame {
                start: 0,
                tier: Tier::Fast,
                series: 0,
                #[cfg(feature = "strict")]
                id: "",
            };
            max_depth
        ];
        Recorder {
            frames,
            depth: 0,
            series: Vec::new(),
            slot,
            capacity,
        }
    }

    /// Resolves the local series index for `id`, creating and registering the
    /// ring buffer on first use.
    fn series_index(&mut self, id: SpanId) -> usize {
        // Pointer comparison catches the common case (same literal, same
        // address) without touching the bytes.
        if let Some(i) = self
            .series
            .iter()
            .position(|s| std::ptr::eq(s.id, id) || s.id == id)
        {
            return i;
        }
        let store = Arc::new(SampleStore::new(self.capacity));
        self.slot
            .series
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SharedSeries {
                id,
                store: Arc::clone(&store),
            });
        self.series.push(LocalSeries {
            id,
            store,
            last_pulse: 0,
        });
        self.series.len() - 1
    }

    /// Starts a span: pushes `(id, now, tier)` onto the stack.
    ///
    /// If the stack is already `max_depth` deep the push is silently dropped.
    /// The timestamp is captured last, after any first-use bookkeeping, so
    /// setup cost never lands inside the measured window.
    #[inline]
    pub fn start(&mut self, tier: Tier, id: SpanId) {
        if self.depth == self.frames.len() {
            #[cfg(feature = "strict")]
            panic!("span stack overflow: start({tier:?}, {id:?}) beyond max_depth");
            #[cfg(not(feature = "strict"))]
            return;
        }
        let series = self.series_index(id);
        let frame = &mut self.frames[self.depth];
        frame.tier = tier;
        frame.series = series;
        #[cfg(feature = "strict")]
        {
            frame.id = id;
        }
        self.depth += 1;
        self.frames[self.depth - 1].start = clock::now(tier);
    }

    /// Stops the innermost open span and records its duration.
    ///
    /// The top stack entry is popped *regardless of whether its id matches
    /// `id`*: this tolerates imperfect nesting (early returns) at the cost of
    /// silent mismeasurement when nesting discipline is violated: the sample
    /// is credited to the popped span, not to `id`. Stopping on an empty
    /// stack is a silent no-op.
    ///
    /// The duration is tagged with the (start tier, stop tier) pair, which
    /// calibration corrects per pair.
    #[inline]
    pub fn stop(&mut self, tier: Tier, id: SpanId) {
        let end = clock::now(tier);
        let _ = id;
        if self.depth == 0 {
            #[cfg(feature = "strict")]
            panic!("span stack underflow: stop({tier:?}, {id:?}) with no open span");
            #[cfg(not(feature = "strict"))]
            return;
        }
        self.depth -= 1;
        let frame = self.frames[self.depth];
        #[cfg(feature = "strict")]
        assert_eq!(
            frame.id, id,
            "stop id does not match the innermost open span"
        );
        let delta = sanitize_delta(end.wrapping_sub(frame.start));
        self.series[frame.series]
            .store
            .push(delta, PairKey::of(frame.tier, tier));
    }

    /// Records the delta since the previous `pulse` call with the same id on
    /// this recorder.
    ///
    /// The first call per id only initializes tracking and records nothing;
    /// every subsequent call records one sample under the pulse key and
    /// overwrites the stored timestamp.
    #[inline]
    pub fn pulse(&mut self, id: SpanId) {
        let i = self.series_index(id);
        let now = clock::now(Tier::Fast);
        let series = &mut self.series[i];
        if series.last_pulse != 0 {
            let delta = sanitize_delta(now.wrapping_sub(series.last_pulse));
            series.store.push(delta, PairKey::PULSE);
        }
        series.last_pulse = now;
    }

    /// Current nesting depth (open spans).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Collects and purges one id's samples on this recorder.
    ///
    /// Calibration only: extracts a reserved id's trial population and resets
    /// its store and pulse state between runs.
    pub(crate) fn drain_reserved(&mut self, id: SpanId) -> Vec<u64> {
        let mut out = Vec::new();
        if let Some(series) = self
            .series
            .iter_mut()
            .find(|s| std::ptr::eq(s.id, id) || s.id == id)
        {
            series.store.collect_nonzero(&mut out);
            series.store.clear();
            series.last_pulse = 0;
        }
        out
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("depth", &self.depth)
            .field("max_depth", &self.frames.len())
            .field("span_ids", &self.series.iter().map(|s| s.id).collect::<Vec<_>>())
            .finish()
    }
}

/// Collapses impossible deltas to the 1-cycle minimum.
///
/// A delta of 0 would collide with the empty-slot sentinel; a delta above
/// `i64::MAX` is a wrapped negative, which happens when a cheaper stop tier
/// retires before a pricier start tier on a near-zero span.
#[inline]
fn sanitize_delta(delta: u64) -> u64 {
    if delta == 0 || delta > i64::MAX as u64 {
        1
    } else {
        delta
    }
}

//! Fixed-capacity sample storage, one ring per (thread, span).
//!
//! Each [`SampleStore`] is written by exactly one thread and read, racily, by
//! the aggregator while the writer may still be pushing. The slots are
//! `AtomicU64` with `Relaxed` ordering: a racing reader may observe a torn
//! view of the ring (a duplicated or missing entry, a stale cursor) but never
//! undefined behavior. Exact snapshot consistency is explicitly not a goal:
//! these are statistics, not a ledger.
//!
//! Capacity is a power of two so the write cursor advances with a mask
//! instead of a modulo; once the ring is full the oldest sample is
//! overwritten. Zero is the "slot unused" sentinel, which is why the recorder
//! never stores a literal zero delta.

use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::clock::Tier;

/// Key identifying which (start tier, stop tier) combination produced a
/// sample, or the pulse mode.
///
/// Ten keys exist: the 9 tier pairs plus [`PairKey::PULSE`]. Each carries a
/// distinct measurement overhead, so the calibration table stores one offset
/// per key. An id recorded under more than one key is "mixed" and gets no
/// offset at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairKey(u8);

impl PairKey {
    /// The pulse-mode key.
    pub const PULSE: PairKey = PairKey(9);

    /// Number of distinct keys (9 tier pairs + pulse).
    pub const COUNT: usize = 10;

    /// Key for a (start tier, stop tier) combination.
    #[inline]
    pub fn of(start: Tier, stop: Tier) -> PairKey {
        PairKey((start.index() * 3 + stop.index()) as u8)
    }

    /// Dense index in `0..10`, used to address the calibration table.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit in a store's pair mask.
    #[inline]
    fn bit(self) -> u16 {
        1 << self.0
    }

    /// All keys in table order: the 9 tier pairs, then pulse.
    pub fn all() -> impl Iterator<Item = PairKey> {
        (0..Self::COUNT as u8).map(PairKey)
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == PairKey::PULSE {
            write!(f, "pulse")
        } else {
            let start = Tier::ALL[self.0 as usize / 3];
            let stop = Tier::ALL[self.0 as usize % 3];
            write!(f, "{start}/{stop}")
        }
    }
}

/// Single-writer, racy-reader ring buffer of cycle deltas.
pub(crate) struct SampleStore {
    data: Box<[AtomicU64]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    /// Bitmask of every [`PairKey`] ever pushed into this store.
    pairs: AtomicU16,
}

impl SampleStore {
    /// Creates a store with the given power-of-two capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let data = (0..capacity).map(|_| AtomicU64::new(0)).collect();
        SampleStore {
            data,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            pairs: AtomicU16::new(0),
        }
    }

    /// Pushes one sample under the given key, overwriting the oldest once the
    /// ring is full.
    ///
    /// Must only be called by the owning thread. A zero value is stored as 1
    /// so it cannot be mistaken for an empty slot.
    #[inline]
    pub(crate) fn push(&self, value: u64, key: PairKey) {
        let value = value.max(1);
        let head = self.head.load(Ordering::Relaxed);
        self.data[head & self.mask].store(value, Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Relaxed);
        self.pairs.fetch_or(key.bit(), Ordering::Relaxed);
    }

    /// Appends every nonzero sample to `out`, oldest first.
    ///
    /// Safe against a concurrently advancing writer: the result may contain a
    /// duplicated or missing entry around the cursor, which the caller
    /// tolerates by contract.
    pub(crate) fn collect_nonzero(&self, out: &mut Vec<u64>) {
        let head = self.head.load(Ordering::Relaxed);
        let capacity = self.data.len();
        for i in 0..capacity {
            let slot = (head.wrapping_add(i)) & self.mask;
            let value = self.data[slot].load(Ordering::Relaxed);
            if value != 0 {
                out.push(value);
            }
        }
    }

    /// The set of keys seen by this store, as a raw bitmask.
    #[inline]
    pub(crate) fn pair_mask(&self) -> u16 {
        self.pairs.load(Ordering::Relaxed)
    }

    /// Zeroes every slot and resets the cursor and key mask.
    ///
    /// Used by calibration to purge its reserved ids between trial runs.
    pub(crate) fn clear(&self) {
        for slot in self.data.iter() {
            slot.store(0, Ordering::Relaxed);
        }
        self.head.store(0, Ordering::Relaxed);
        self.pairs.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("capacity", &self.data.len())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("pairs", &format_args!("{:#012b}", self.pair_mask()))
            .finish()
    }
}

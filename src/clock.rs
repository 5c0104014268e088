//! Hardware cycle-counter reads with three escalating ordering tiers.
//!
//! Reading a cycle counter is not one operation but a family of them: the raw
//! read is cheapest but the CPU may retire surrounding instructions on either
//! side of it, which biases very short spans. Each [`Tier`] buys progressively
//! stronger ordering at progressively higher cost:
//!
//! | Tier | x86_64 | aarch64 | Guarantee |
//! |------|--------|---------|-----------|
//! | [`Tier::Fast`] | `rdtsc` | `mrs cntvct_el0` | none (cheapest) |
//! | [`Tier::Mid`] | `rdtscp` | `isb` + read | prior instructions retired |
//! | [`Tier::Hard`] | `lfence` + `rdtscp` | `isb` + read + `isb` | bounded from both directions |
//!
//! Start and Stop of the same span may use different tiers; every pairing is
//! legal and carries its own measurement bias, which the calibration table
//! subtracts afterwards.
//!
//! On architectures without an accessible cycle counter the reads fall back to
//! a monotonic [`Instant`](std::time::Instant)-based nanosecond clock. The engine still works; the
//! unit is just nanoseconds rather than cycles and all three tiers cost the
//! same.

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
use std::time::Instant;

/// Timestamp-capture precision tier.
///
/// A small closed enum dispatched with a `match`: at instrumentation call
/// frequencies the branch is perfectly predicted, so runtime dispatch costs
/// nothing over compile-time specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Raw, unserialized counter read. Cheapest; adjacent instructions may be
    /// reordered around it.
    Fast,
    /// Serializing read: all prior instructions complete before the read.
    Mid,
    /// Full fence plus serializing read: reordering bounded from both
    /// directions. Most expensive.
    Hard,
}

impl Tier {
    /// All tiers, in escalating order of cost.
    pub const ALL: [Tier; 3] = [Tier::Fast, Tier::Mid, Tier::Hard];

    /// Dense index in `0..3`, used to address the calibration table.
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Tier::Fast => 0,
            Tier::Mid => 1,
            Tier::Hard => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Mid => write!(f, "mid"),
            Tier::Hard => write!(f, "hard"),
        }
    }
}

/// Read the counter at the requested tier.
#[inline(always)]
pub(crate) fn now(tier: Tier) -> u64 {
    match tier {
        Tier::Fast => read_fast(),
        Tier::Mid => read_mid(),
        Tier::Hard => read_hard(),
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_fast() -> u64 {
    // SAFETY: rdtsc is always available on x86_64 and has no requirements.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_mid() -> u64 {
    let mut aux = 0u32;
    // SAFETY: rdtscp is present on every x86_64 CPU this crate targets; the
    // aux out-parameter is a valid local.
    unsafe { core::arch::x86_64::__rdtscp(&mut aux) }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_hard() -> u64 {
    let mut aux = 0u32;
    // SAFETY: lfence and rdtscp are unprivileged and side-effect free.
    unsafe {
        core::arch::x86_64::_mm_lfence();
        core::arch::x86_64::__rdtscp(&mut aux)
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_fast() -> u64 {
    let val: u64;
    // SAFETY: cntvct_el0 is readable from EL0 on Linux and macOS.
    unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nostack, nomem)) };
    val
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_mid() -> u64 {
    let val: u64;
    // isb retires all prior instructions before the counter read.
    // SAFETY: as read_fast, plus isb which is unprivileged.
    unsafe {
        core::arch::asm!("isb", "mrs {}, cntvct_el0", out(reg) val, options(nostack, nomem))
    };
    val
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_hard() -> u64 {
    let val: u64;
    // SAFETY: as read_mid; the trailing isb keeps later instructions from
    // starting before the read completes.
    unsafe {
        core::arch::asm!("isb", "mrs {}, cntvct_el0", "isb", out(reg) val, options(nostack, nomem))
    };
    val
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn fallback_ns() -> u64 {
    use std::sync::OnceLock;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_fast() -> u64 {
    fallback_ns()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_mid() -> u64 {
    fallback_ns()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_hard() -> u64 {
    fallback_ns()
}

/// Full serializing fence, used to isolate calibration trials from each other
/// and from surrounding code.
#[inline]
pub(crate) fn fence() {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    #[cfg(target_arch = "x86_64")]
    // SAFETY: mfence/lfence are unprivileged and side-effect free.
    unsafe {
        core::arch::x86_64::_mm_mfence();
        core::arch::x86_64::_mm_lfence();
    }

    #[cfg(target_arch = "aarch64")]
    // SAFETY: dsb/isb are unprivileged barriers.
    unsafe {
        core::arch::asm!("dsb sy", "isb", options(nostack, nomem));
    }

    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_indices_are_dense() {
        assert_eq!(Tier::Fast.index(), 0);
        assert_eq!(Tier::Mid.index(), 1);
        assert_eq!(Tier::Hard.index(), 2);
    }

    #[test]
    fn test_all_contains_every_tier() {
        assert_eq!(Tier::ALL.len(), 3);
        for (i, tier) in Tier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
    }

    #[test]
    fn test_now_is_monotonic_enough() {
        // Raw counters can in principle differ across cores, but back-to-back
        // reads on one thread must not go backwards by more than noise.
        for tier in Tier::ALL {
            let a = now(tier);
            let b = now(tier);
            assert!(b >= a, "tier {tier} went backwards: {a} -> {b}");
        }
    }

    #[test]
    fn test_now_advances() {
        let a = now(Tier::Hard);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = now(Tier::Hard);
        assert!(b > a);
    }

    #[test]
    fn test_fence_is_callable() {
        fence();
        fence();
    }

    #[test]
    fn test_display() {
        assert_eq!(Tier::Fast.to_string(), "fast");
        assert_eq!(Tier::Mid.to_string(), "mid");
        assert_eq!(Tier::Hard.to_string(), "hard");
    }
}

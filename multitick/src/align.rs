//! Phase alignment against the absolute wall clock
//!
//! Interval boundaries are measured from the Unix epoch, not from construction time,
//! so independently created tickers with the same interval and offset tick together.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Time since the most recent interval boundary on the wall clock
pub fn phase_of(now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_ns = interval.as_nanos() as i128;
    if interval_ns == 0 {
        return Duration::ZERO;
    }
    let now_ns = now.timestamp() as i128 * NANOS_PER_SEC + now.timestamp_subsec_nanos() as i128;
    nanos(now_ns.rem_euclid(interval_ns))
}

/// Reduce an offset into `[0, interval)`
pub fn normalize_offset(offset: Duration, interval: Duration) -> Duration {
    let interval_ns = interval.as_nanos();
    if interval_ns == 0 {
        return Duration::ZERO;
    }
    nanos((offset.as_nanos() % interval_ns) as i128)
}

/// How long to wait from `now` until the next instant whose phase equals `offset`.
///
/// Returns zero when `now` sits exactly on the offset point.
pub fn alignment_delay(now: DateTime<Utc>, interval: Duration, offset: Duration) -> Duration {
    let offset = normalize_offset(offset, interval);
    let elapsed = phase_of(now, interval);

    if elapsed <= offset {
        // Offset point in this interval is still ahead
        offset - elapsed
    } else {
        // Already past it, wait for the next interval's offset point
        (interval - elapsed) + offset
    }
}

/// Offset drawn uniformly from `[0, interval)`.
///
/// Without a seed the generator is seeded from the wall clock.
pub fn random_offset(interval: Duration, seed: Option<u64>) -> Duration {
    let seed = seed.unwrap_or_else(wall_clock_seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let interval_ns = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
    if interval_ns == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.random_range(0..interval_ns))
}

/// Seed for generators the caller did not seed, taken from the wall clock in nanoseconds
pub fn wall_clock_seed() -> u64 {
    let now = Utc::now();
    (now.timestamp() as u64)
        .wrapping_mul(NANOS_PER_SEC as u64)
        .wrapping_add(now.timestamp_subsec_nanos() as u64)
}

fn nanos(ns: i128) -> Duration {
    let ns = ns.max(0) as u128;
    Duration::new(
        (ns / NANOS_PER_SEC as u128) as u64,
        (ns % NANOS_PER_SEC as u128) as u32,
    )
}

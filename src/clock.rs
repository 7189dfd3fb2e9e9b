//! Tick↔duration conversion at the reporting edge.
//!
//! The hot path accumulates raw monotonic clock ticks; nothing in the
//! write path ever scales them. Conversion to wall-clock durations happens
//! only when a reader asks for it, through the two functions here.
//!
//! The scaling factor is a process-wide constant: [`quanta::Clock`]
//! calibrates the raw tick frequency once, lazily, on first use. The
//! calibration is initialization-order independent, so the conversion can
//! be called from any thread at any point in the process lifetime.

use std::sync::OnceLock;
use std::time::Duration;

use quanta::Clock;

/// Raw-tick span used to derive the nanoseconds-per-tick factor once.
const CALIBRATION_SPAN: u64 = 1 << 24;

struct TickClock {
    clock: Clock,
    nanos_per_tick: f64,
}

static TICK_CLOCK: OnceLock<TickClock> = OnceLock::new();

fn tick_clock() -> &'static TickClock {
    TICK_CLOCK.get_or_init(|| {
        let clock = Clock::new();
        let nanos = clock.delta_as_nanos(0, CALIBRATION_SPAN) as f64;
        TickClock {
            clock,
            nanos_per_tick: (nanos / CALIBRATION_SPAN as f64).max(f64::MIN_POSITIVE),
        }
    })
}

/// Current raw monotonic tick. This is the only clock read on the hot path.
#[inline]
pub(crate) fn now_ticks() -> u64 {
    tick_clock().clock.raw()
}

/// Converts accumulated raw ticks to a nanosecond-precise duration.
///
/// Non-positive tick counts convert to [`Duration::ZERO`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tallies::clock::{duration_to_ticks, ticks_to_duration};
///
/// let ticks = duration_to_ticks(Duration::from_millis(10));
/// let back = ticks_to_duration(ticks);
/// assert!(back >= Duration::from_micros(9_990));
/// assert!(back <= Duration::from_micros(10_010));
/// ```
pub fn ticks_to_duration(ticks: i64) -> Duration {
    if ticks <= 0 {
        return Duration::ZERO;
    }
    tick_clock().clock.delta(0, ticks as u64)
}

/// Converts a duration to the equivalent raw tick count, rounding to the
/// nearest tick and saturating at `i64::MAX`.
pub fn duration_to_ticks(duration: Duration) -> i64 {
    let ticks = duration.as_nanos() as f64 / tick_clock().nanos_per_tick;
    ticks.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_roundtrip() {
        assert_eq!(duration_to_ticks(Duration::ZERO), 0);
        assert_eq!(ticks_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_negative_ticks_clamp_to_zero() {
        assert_eq!(ticks_to_duration(-5), Duration::ZERO);
    }

    #[test]
    fn test_roundtrip_within_clock_granularity() {
        for millis in [1u64, 10, 250, 1_000] {
            let original = Duration::from_millis(millis);
            let back = ticks_to_duration(duration_to_ticks(original));
            let diff = if back > original {
                back - original
            } else {
                original - back
            };
            assert!(
                diff < Duration::from_micros(50),
                "{original:?} -> {back:?} drifted by {diff:?}"
            );
        }
    }

    #[test]
    fn test_now_ticks_is_monotonic() {
        let a = now_ticks();
        let b = now_ticks();
        assert!(b >= a);
    }

    #[test]
    fn test_elapsed_ticks_track_real_time() {
        let start = now_ticks();
        std::thread::sleep(Duration::from_millis(20));
        let elapsed = ticks_to_duration((now_ticks() - start) as i64);
        assert!(elapsed >= Duration::from_millis(19));
        assert!(elapsed < Duration::from_secs(2));
    }
}

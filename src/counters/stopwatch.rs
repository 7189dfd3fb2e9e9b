//! Scoped stopwatch acquisition.
//!
//! A [`Stopwatch`] captures a raw monotonic tick when opened and commits
//! on release: the elapsed ticks go into the duration matrix (only when
//! positive) and the call count goes up by exactly one, unconditionally,
//! on every exit path, including unwinding. Release happens in `Drop`, so
//! a scope can never commit twice and can never be forgotten on an early
//! return.

use std::time::Duration;

use crate::clock;
use crate::counters::group::CounterGroup;

/// A strictly scoped timing acquisition for one stopwatch counter.
///
/// Created through [`start`](crate::CounterCollection::start) (or a
/// handle's [`start`](crate::Counter::start)); commits when dropped.
#[must_use = "a stopwatch commits its elapsed time when dropped; binding it to `_` releases immediately"]
#[derive(Debug)]
pub struct Stopwatch<'c> {
    group: &'c CounterGroup,
    column: u16,
    start: u64,
}

impl<'c> Stopwatch<'c> {
    pub(crate) fn begin(group: &'c CounterGroup, column: u16) -> Self {
        Stopwatch {
            group,
            column,
            start: clock::now_ticks(),
        }
    }

    /// Live elapsed time since the scope opened, without releasing.
    pub fn elapsed_so_far(&self) -> Duration {
        let ticks = clock::now_ticks().saturating_sub(self.start);
        clock::ticks_to_duration(clamp_ticks(ticks))
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        let elapsed = clamp_ticks(clock::now_ticks().saturating_sub(self.start));
        // Destructors cannot surface errors; an overflow on release is
        // discarded along with the ticks it rejected.
        if elapsed > 0 {
            let _ = self.group.add_duration(self.column, elapsed);
        }
        let _ = self.group.add_count(self.column, 1);
    }
}

#[inline]
fn clamp_ticks(ticks: u64) -> i64 {
    ticks.min(i64::MAX as u64) as i64
}

//! Lightweight per-counter handles.

use std::time::Duration;

use crate::clock;
use crate::counters::group::CounterGroup;
use crate::counters::stopwatch::Stopwatch;
use crate::error::CounterError;
use crate::schema::CounterKind;

/// A small value binding one collection, one column, its kind, and its
/// display name: a convenient call-site package for a single counter.
///
/// Handles are cheap to copy and carry no state of their own; every
/// operation goes straight to the owning collection's matrices.
#[derive(Clone, Copy)]
pub struct Counter<'c> {
    group: &'c CounterGroup,
    column: u16,
    kind: CounterKind,
    name: &'c str,
}

impl<'c> Counter<'c> {
    /// Binds a handle to column `id` of `group`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid column; handles always satisfy
    /// `0 <= id < columns`.
    pub(crate) fn new(group: &'c CounterGroup, id: u16) -> Self {
        assert!(
            id < group.columns(),
            "counter id {id} out of range (collection has {})",
            group.columns()
        );
        Counter {
            group,
            column: id,
            kind: group.schema().kind(id),
            name: group.schema().name(id),
        }
    }

    /// Display name of this counter.
    #[inline]
    pub fn name(&self) -> &'c str {
        self.name
    }

    /// Numeric or stopwatch.
    #[inline]
    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Adds one to the count.
    #[inline]
    pub fn increment(&self) -> crate::Result<()> {
        self.group.add_count(self.column, 1)
    }

    /// Subtracts one from the count.
    #[inline]
    pub fn decrement(&self) -> crate::Result<()> {
        self.group.add_count(self.column, -1)
    }

    /// Adds `delta` (possibly negative) to the count.
    #[inline]
    pub fn add(&self, delta: i64) -> crate::Result<()> {
        self.group.add_count(self.column, delta)
    }

    /// Folded count across all rows. Never fails.
    #[inline]
    pub fn value(&self) -> i64 {
        self.group.read_count(self.column)
    }

    /// Accumulated elapsed time of a stopwatch counter.
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric counter.
    pub fn duration(&self) -> crate::Result<Duration> {
        self.require_stopwatch()?;
        Ok(clock::ticks_to_duration(
            self.group.read_duration(self.column),
        ))
    }

    /// Adds an explicit duration to a stopwatch counter, bypassing the
    /// scope machinery (the call count is not touched).
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric counter;
    /// [`CounterError::Overflow`] if the tick add wraps.
    pub fn add_duration(&self, duration: Duration) -> crate::Result<()> {
        self.require_stopwatch()?;
        self.group
            .add_duration(self.column, clock::duration_to_ticks(duration))
    }

    /// Opens a stopwatch scope on this counter. On release the scope adds
    /// the elapsed ticks and one call.
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric counter.
    pub fn start(&self) -> crate::Result<Stopwatch<'c>> {
        self.require_stopwatch()?;
        Ok(Stopwatch::begin(self.group, self.column))
    }

    fn require_stopwatch(&self) -> crate::Result<()> {
        if self.kind != CounterKind::Stopwatch {
            return Err(CounterError::WrongCounterType {
                counter: self.name.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Counter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.value())
    }
}

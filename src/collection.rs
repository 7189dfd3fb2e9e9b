//! The typed counter collection.
//!
//! [`CounterCollection<E>`] layers an enum-keyed facade over the untyped
//! [`CounterGroup`](crate::CounterGroup) core: every operation takes a
//! member of a [`counter_enum!`](crate::counter_enum)-declared enum and
//! resolves it to a column through the schema bound once per enum type.
//!
//! ```rust
//! use tallies::{counter_enum, CounterCollection};
//!
//! counter_enum! {
//!     pub enum BuildStats {
//!         PipsExecuted,
//!         CacheMisses,
//!         ExecuteDuration: stopwatch,
//!     }
//! }
//!
//! let totals = CounterCollection::<BuildStats>::new(None).unwrap();
//! let phase = CounterCollection::new(Some(&totals)).unwrap();
//!
//! phase.increment(BuildStats::PipsExecuted).unwrap();
//! {
//!     let _timing = phase.start(BuildStats::ExecuteDuration).unwrap();
//!     // ... do the work being measured ...
//! }
//!
//! // Increments propagated into the parent collection.
//! assert_eq!(totals.value(BuildStats::PipsExecuted), 1);
//! assert_eq!(phase.value(BuildStats::ExecuteDuration), 1);
//!
//! let stats = phase.statistics(Some("build"));
//! assert_eq!(stats["build.PipsExecuted"], 1);
//! assert!(stats.contains_key("build.ExecuteDurationMs"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Add;
use std::sync::Arc;
use std::time::Duration;

use crate::clock;
use crate::counters::group::CounterGroup;
use crate::counters::handle::Counter;
use crate::counters::stopwatch::Stopwatch;
use crate::error::CounterError;
use crate::schema::{CounterEnum, CounterKind};

/// An enum-keyed collection of sharded counters.
///
/// Collections of the same enum type always share one schema, so merge,
/// difference, and sum between them can never mismatch. Parent links form
/// a tree: adds on a child recurse into its parent, letting per-phase
/// collections feed an aggregate.
pub struct CounterCollection<E: CounterEnum> {
    core: Arc<CounterGroup>,
    _enum: PhantomData<fn() -> E>,
}

impl<E: CounterEnum> CounterCollection<E> {
    /// Creates a zeroed collection, optionally linked under `parent` so
    /// that every add propagates into it.
    ///
    /// The enum's schema is bound on first use and cached for the process.
    ///
    /// # Errors
    ///
    /// [`CounterError::InvalidCounterSchema`] if the enum cannot be bound
    /// (non-dense values or cardinality over 16 bits).
    pub fn new(parent: Option<&Self>) -> crate::Result<Self> {
        let schema = Arc::clone(E::schema()?);
        let core = CounterGroup::new(schema, parent.map(|p| Arc::clone(&p.core)))?;
        Ok(Self::from_core(core))
    }

    fn from_core(core: CounterGroup) -> Self {
        CounterCollection {
            core: Arc::new(core),
            _enum: PhantomData,
        }
    }

    #[inline]
    fn column(&self, member: E) -> u16 {
        (member.raw_value() - self.core.schema().offset()) as u16
    }

    /// A lightweight [`Counter`] handle for `member`.
    pub fn counter(&self, member: E) -> Counter<'_> {
        self.core.counter(self.column(member))
    }

    /// Adds one to `member`'s count.
    ///
    /// # Errors
    ///
    /// [`CounterError::Overflow`] if the add wraps at any level of the
    /// parent chain.
    #[inline]
    pub fn increment(&self, member: E) -> crate::Result<()> {
        self.core.add_count(self.column(member), 1)
    }

    /// Subtracts one from `member`'s count.
    #[inline]
    pub fn decrement(&self, member: E) -> crate::Result<()> {
        self.core.add_count(self.column(member), -1)
    }

    /// Adds `delta` (possibly negative) to `member`'s count.
    #[inline]
    pub fn add(&self, member: E, delta: i64) -> crate::Result<()> {
        self.core.add_count(self.column(member), delta)
    }

    /// Adds an explicit duration to a stopwatch member without touching
    /// its call count.
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric member;
    /// [`CounterError::Overflow`] if the tick add wraps.
    pub fn add_duration(&self, member: E, duration: Duration) -> crate::Result<()> {
        let id = self.require_stopwatch(member)?;
        self.core.add_duration(id, clock::duration_to_ticks(duration))
    }

    /// Folded count for `member`. Never fails.
    ///
    /// For stopwatch members this is the number of completed scopes.
    #[inline]
    pub fn value(&self, member: E) -> i64 {
        self.core.read_count(self.column(member))
    }

    /// Accumulated elapsed time for a stopwatch member.
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric member.
    pub fn elapsed(&self, member: E) -> crate::Result<Duration> {
        let id = self.require_stopwatch(member)?;
        Ok(clock::ticks_to_duration(self.core.read_duration(id)))
    }

    /// Opens a stopwatch scope on `member`. On release (drop) the scope
    /// adds its elapsed ticks and one call, propagating into the parent
    /// chain.
    ///
    /// # Errors
    ///
    /// [`CounterError::WrongCounterType`] on a numeric member.
    pub fn start(&self, member: E) -> crate::Result<Stopwatch<'_>> {
        let id = self.require_stopwatch(member)?;
        Ok(Stopwatch::begin(self.core.as_ref(), id))
    }

    /// `self.value(member) - other.value(member)`, saturating. Collections
    /// of one enum type always share a schema, so this cannot mismatch.
    pub fn difference(&self, other: &Self, member: E) -> i64 {
        self.value(member).saturating_sub(other.value(member))
    }

    /// Elapsed-time analogue of [`difference`](Self::difference), clamped
    /// at zero.
    pub fn duration_difference(&self, other: &Self, member: E) -> Duration {
        let id = self.column(member);
        let ticks = self
            .core
            .read_duration(id)
            .saturating_sub(other.core.read_duration(id));
        clock::ticks_to_duration(ticks)
    }

    /// Additively merges every cell of `other` into `self`, both matrices.
    /// `other` is unchanged; the parent link is not traversed.
    ///
    /// # Errors
    ///
    /// [`CounterError::Overflow`] if a cell add wraps; cells already
    /// merged stay merged.
    pub fn merge_from(&self, other: &Self) -> crate::Result<()> {
        self.core.merge_from(&other.core)
    }

    /// An independent, parent-less frozen copy of the current values
    /// (fuzzy under concurrent writers, within the documented bound).
    pub fn snapshot(&self) -> Self {
        Self::from_core(self.core.snapshot())
    }

    /// Element-wise sum of two collections into a fresh, parent-less one.
    ///
    /// # Errors
    ///
    /// [`CounterError::Overflow`] if any cell sum wraps.
    pub fn sum(a: &Self, b: &Self) -> crate::Result<Self> {
        CounterGroup::sum(&a.core, &b.core).map(Self::from_core)
    }

    /// Handles for every counter, in enumeration (column) order.
    pub fn counters(&self) -> impl Iterator<Item = Counter<'_>> + '_ {
        (0..self.core.columns()).map(move |id| self.core.counter(id))
    }

    /// Folds the collection into a flat `name -> value` export map.
    ///
    /// Keys are `"{prefix}.{name}"`, or the bare name when `prefix` is
    /// absent, empty, or whitespace. Stopwatch members export under
    /// `"{key}Ms"` with their elapsed time truncated to whole
    /// milliseconds (the only place tick-to-millisecond rounding happens);
    /// numeric members export their folded count.
    pub fn statistics(&self, prefix: Option<&str>) -> BTreeMap<String, i64> {
        let prefix = prefix.map(str::trim).filter(|p| !p.is_empty());
        let schema = self.core.schema();
        let mut stats = BTreeMap::new();
        for id in 0..schema.columns() {
            let key = match prefix {
                Some(prefix) => format!("{prefix}.{}", schema.name(id)),
                None => schema.name(id).to_string(),
            };
            match schema.kind(id) {
                CounterKind::Stopwatch => {
                    let elapsed = clock::ticks_to_duration(self.core.read_duration(id));
                    stats.insert(format!("{key}Ms"), elapsed.as_millis() as i64);
                }
                CounterKind::Numeric => {
                    stats.insert(key, self.core.read_count(id));
                }
            }
        }
        stats
    }

    fn require_stopwatch(&self, member: E) -> crate::Result<u16> {
        let id = self.column(member);
        let schema = self.core.schema();
        if schema.kind(id) != CounterKind::Stopwatch {
            return Err(CounterError::WrongCounterType {
                counter: schema.name(id).to_string(),
            });
        }
        Ok(id)
    }
}

impl<E: CounterEnum> Clone for CounterCollection<E> {
    /// Deep copy: independent matrices holding the current values, sharing
    /// the *same* parent link. The copy itself propagates nothing; adds on
    /// the clone do.
    fn clone(&self) -> Self {
        Self::from_core(self.core.as_ref().clone())
    }
}

impl<E: CounterEnum> Add for &CounterCollection<E> {
    type Output = CounterCollection<E>;

    /// Element-wise sum into a fresh, parent-less collection.
    ///
    /// # Panics
    ///
    /// Panics if a cell sum wraps past the 64-bit boundary; use
    /// [`CounterCollection::sum`] to handle that case as an error.
    fn add(self, other: &CounterCollection<E>) -> CounterCollection<E> {
        match CounterCollection::sum(self, other) {
            Ok(total) => total,
            Err(err) => panic!("counter collection sum failed: {err}"),
        }
    }
}

impl<E: CounterEnum> fmt::Display for CounterCollection<E> {
    /// One line per counter: name padded to 50, value padded to 8, and an
    /// `HH:MM:SS.fff` elapsed suffix for stopwatch counters only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.core.schema();
        for id in 0..schema.columns() {
            write!(
                f,
                "{:<50}: {:>8}",
                schema.name(id),
                self.core.read_count(id)
            )?;
            if schema.kind(id) == CounterKind::Stopwatch {
                let elapsed = clock::ticks_to_duration(self.core.read_duration(id));
                write!(f, " {}", format_elapsed(elapsed))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<E: CounterEnum> fmt::Debug for CounterCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_millis = elapsed.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_millis / 3_600_000,
        total_millis / 60_000 % 60,
        total_millis / 1_000 % 60,
        total_millis % 1_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_enum;
    use std::thread;
    use std::time::Duration;

    counter_enum! {
        enum Pair {
            A,
            B: stopwatch,
        }
    }

    counter_enum! {
        enum Mixed {
            N,
            T: stopwatch,
        }
    }

    #[test]
    fn test_two_counter_single_thread() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        for _ in 0..3 {
            counters.increment(Pair::A).unwrap();
        }
        {
            let _scope = counters.start(Pair::B).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(counters.value(Pair::A), 3);
        assert_eq!(counters.value(Pair::B), 1);
        let elapsed = counters.elapsed(Pair::B).unwrap();
        assert!(elapsed >= Duration::from_millis(9));
        assert!(elapsed < Duration::from_secs(5));

        let stats = counters.statistics(None);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["A"], 3);
        assert!(stats["BMs"] >= 9 && stats["BMs"] < 5_000);
    }

    #[test]
    fn test_parent_propagation() {
        let parent = CounterCollection::<Pair>::new(None).unwrap();
        let child = CounterCollection::new(Some(&parent)).unwrap();

        child.add(Pair::A, 5).unwrap();
        child.add(Pair::A, 7).unwrap();

        assert_eq!(child.value(Pair::A), 12);
        assert_eq!(parent.value(Pair::A), 12);
    }

    #[test]
    fn test_stopwatch_scope_propagates_to_parent() {
        let parent = CounterCollection::<Pair>::new(None).unwrap();
        let child = CounterCollection::new(Some(&parent)).unwrap();
        {
            let _scope = child.start(Pair::B).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(parent.value(Pair::B), 1);
        assert!(parent.elapsed(Pair::B).unwrap() >= Duration::from_millis(4));
    }

    #[test]
    fn test_snapshot_isolation() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        for _ in 0..100 {
            counters.increment(Pair::A).unwrap();
        }
        let frozen = counters.snapshot();
        for _ in 0..50 {
            counters.increment(Pair::A).unwrap();
        }

        assert_eq!(frozen.value(Pair::A), 100);
        assert_eq!(counters.value(Pair::A), 150);
        assert_eq!(counters.difference(&frozen, Pair::A), 50);
    }

    #[test]
    fn test_concurrent_producers() {
        let counters = Arc::new(CounterCollection::<Pair>::new(None).unwrap());
        let mut handles = vec![];
        for _ in 0..16 {
            let counters = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    counters.increment(Pair::A).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.value(Pair::A), 160_000);
    }

    #[test]
    fn test_mixed_statistics_with_prefix() {
        let counters = CounterCollection::<Mixed>::new(None).unwrap();
        counters.add(Mixed::N, 42).unwrap();
        {
            let _scope = counters.start(Mixed::T).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        {
            let _scope = counters.start(Mixed::T).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        let stats = counters.statistics(Some("prefix"));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["prefix.N"], 42);
        assert!(stats["prefix.TMs"] >= 14 && stats["prefix.TMs"] < 5_000);
    }

    #[test]
    fn test_whitespace_prefix_is_ignored() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.increment(Pair::A).unwrap();
        let stats = counters.statistics(Some("   "));
        assert_eq!(stats["A"], 1);
    }

    #[test]
    fn test_overflow_detection() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.add(Pair::A, i64::MAX - 5).unwrap();
        let err = counters.add(Pair::A, 10).unwrap_err();
        assert_eq!(
            err,
            CounterError::Overflow {
                counter: "A".to_string(),
                delta: 10,
            }
        );
    }

    #[test]
    fn test_invalid_schema_surfaces_on_construction() {
        counter_enum! {
            enum Sparse {
                Low = 0,
                High = 7,
            }
        }
        let err = CounterCollection::<Sparse>::new(None).unwrap_err();
        assert!(matches!(err, CounterError::InvalidCounterSchema(_)));
        // The cached binding failure comes back on every attempt.
        let again = CounterCollection::<Sparse>::new(None).unwrap_err();
        assert_eq!(err, again);
    }

    #[test]
    fn test_wrong_counter_type() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        assert!(matches!(
            counters.start(Pair::A).unwrap_err(),
            CounterError::WrongCounterType { .. }
        ));
        assert!(counters.elapsed(Pair::A).is_err());
        assert!(counters
            .add_duration(Pair::A, Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn test_numeric_ops_on_stopwatch_member_are_permitted() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.increment(Pair::B).unwrap();
        counters.add(Pair::B, 2).unwrap();
        assert_eq!(counters.value(Pair::B), 3);
        assert_eq!(counters.elapsed(Pair::B).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_add_duration_feeds_elapsed() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters
            .add_duration(Pair::B, Duration::from_millis(250))
            .unwrap();
        let elapsed = counters.elapsed(Pair::B).unwrap();
        assert!(elapsed >= Duration::from_millis(249));
        assert!(elapsed <= Duration::from_millis(251));
        assert_eq!(counters.value(Pair::B), 0);
    }

    #[test]
    fn test_sum_operator() {
        let a = CounterCollection::<Pair>::new(None).unwrap();
        let b = CounterCollection::<Pair>::new(None).unwrap();
        a.add(Pair::A, 40).unwrap();
        b.add(Pair::A, 2).unwrap();
        a.add_duration(Pair::B, Duration::from_millis(3)).unwrap();
        b.add_duration(Pair::B, Duration::from_millis(4)).unwrap();

        let total = &a + &b;
        assert_eq!(total.value(Pair::A), 42);
        let elapsed = total.elapsed(Pair::B).unwrap();
        assert!(elapsed >= Duration::from_millis(6));
        // Inputs unchanged.
        assert_eq!(a.value(Pair::A), 40);
        assert_eq!(b.value(Pair::A), 2);
    }

    #[test]
    fn test_merge_from_empty_snapshot_is_a_no_op() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.add(Pair::A, 9).unwrap();
        let empty = CounterCollection::<Pair>::new(None).unwrap().snapshot();
        counters.merge_from(&empty).unwrap();
        assert_eq!(counters.value(Pair::A), 9);
    }

    #[test]
    fn test_difference_of_own_snapshot_is_zero_under_quiescence() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.add(Pair::A, 1234).unwrap();
        let frozen = counters.snapshot();
        assert_eq!(counters.difference(&frozen, Pair::A), 0);
        assert_eq!(
            counters.duration_difference(&frozen, Pair::B),
            Duration::ZERO
        );
    }

    #[test]
    fn test_clone_is_independent_and_keeps_parent() {
        let parent = CounterCollection::<Pair>::new(None).unwrap();
        let child = CounterCollection::new(Some(&parent)).unwrap();
        child.add(Pair::A, 10).unwrap();

        let copy = child.clone();
        assert_eq!(copy.value(Pair::A), 10);
        assert_eq!(parent.value(Pair::A), 10);

        copy.increment(Pair::A).unwrap();
        assert_eq!(copy.value(Pair::A), 11);
        assert_eq!(child.value(Pair::A), 10);
        assert_eq!(parent.value(Pair::A), 11);
    }

    #[test]
    fn test_enumeration_order_and_names() {
        counter_enum! {
            enum Ordered {
                First,
                Second: stopwatch,
                Third as "ThirdRenamed",
            }
        }
        let counters = CounterCollection::<Ordered>::new(None).unwrap();
        let names: Vec<&str> = counters.counters().map(|c| c.name()).collect();
        assert_eq!(names, ["First", "Second", "ThirdRenamed"]);
        let kinds: Vec<CounterKind> = counters.counters().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            [
                CounterKind::Numeric,
                CounterKind::Stopwatch,
                CounterKind::Numeric
            ]
        );
    }

    #[test]
    fn test_handles_share_the_collection() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        let handle = counters.counter(Pair::A);
        handle.add(5).unwrap();
        assert_eq!(counters.value(Pair::A), 5);
        assert_eq!(handle.value(), 5);
    }

    #[test]
    fn test_display_rendering() {
        let counters = CounterCollection::<Pair>::new(None).unwrap();
        counters.add(Pair::A, 5).unwrap();
        counters
            .add_duration(Pair::B, Duration::from_millis(1_234))
            .unwrap();
        counters.increment(Pair::B).unwrap();

        let rendered = counters.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("{:<50}: {:>8}", "A", 5));
        assert!(lines[1].starts_with(&format!("{:<50}: {:>8} 00:00:01.", "B", 1)));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(1_234)), "00:00:01.234");
        assert_eq!(
            format_elapsed(Duration::from_secs(2 * 3600 + 3 * 60 + 4)),
            "02:03:04.000"
        );
    }
}

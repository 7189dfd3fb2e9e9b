//! Core sharding infrastructure shared by every counter collection.
//!
//! A naive global atomic per counter turns hot increments into cache-line
//! ping-pong: every core must take exclusive ownership of the line before
//! its fetch-add can retire, and throughput collapses as core counts grow.
//! Full per-CPU replication fixes the contention but costs a padded cache
//! line per counter per CPU.
//!
//! This crate splits the difference with a shard *matrix*: 64 rows, one
//! soft-owned by each logical CPU slot, where a single row packs the cells
//! of many counters into shared cache lines. Contention stays bounded to
//! one row per slot, while per-counter memory overhead amortizes across
//! every counter in the collection.
//!
//! ```text
//!                         columns (one per counter)
//!                   ┌────┬────┬────┬────┬────┬──pad──┐
//!   slot 0  ──────► │ c0 │ c1 │ c2 │ c3 │ c4 │ ░░░░░ │  row 0
//!   slot 1  ──────► │ c0 │ c1 │ c2 │ c3 │ c4 │ ░░░░░ │  row 1
//!     ...           │                                │   ...
//!   slot 63 ──────► │ c0 │ c1 │ c2 │ c3 │ c4 │ ░░░░░ │  row 63
//!                   └────┴────┴────┴────┴────┴───────┘
//!                              │
//!                              ▼
//!                    read folds one column
//!                    across all 64 rows
//! ```
//!
//! Rows are padded up to whole cache lines, so no line is ever shared by
//! two rows, and writers on different slots never invalidate each other.
//!
//! # Slot assignment
//!
//! There is no portable "which CPU am I on" primitive, so slots are
//! assigned round-robin: a global counter hands each thread a slot on its
//! first write, cached in thread-local storage for the thread's lifetime
//! and taken modulo the row count. The value is purely advisory: every
//! cell write is an atomic fetch-add, so two threads landing on the same
//! row stay correct and merely contend a little more. Past 64 live writer
//! threads the mapping wraps and contention degrades gracefully.

pub mod group;
pub mod handle;
pub(crate) mod matrix;
pub mod stopwatch;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of shard rows in every matrix.
///
/// Matches a common OS processor-group size. Machines with fewer cores
/// leave some rows at zero (a little wasted memory, strictly less
/// contention); machines with more cores map many-to-one per group, which
/// bounds contention at the group level instead of the whole machine.
pub(crate) const SHARD_ROWS: usize = 64;

/// Hands out the next row slot; wraps modulo [`SHARD_ROWS`].
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Row slot assigned to the current thread, fixed for its lifetime.
    static THREAD_SLOT: usize = NEXT_SLOT.fetch_add(1, Ordering::Relaxed) % SHARD_ROWS;
}

/// Returns the current thread's row slot, in `[0, SHARD_ROWS)`.
///
/// Relaxed ordering on the allocator is enough: only atomicity matters,
/// and an occasional pair of threads sharing a slot affects contention,
/// not correctness.
#[inline]
pub(crate) fn current_slot() -> usize {
    THREAD_SLOT.with(|slot| *slot)
}

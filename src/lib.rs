//! # Tallies - Cache-Aware Sharded Counter Collections
//!
//! A Rust library for recording operation counts and elapsed-time
//! accumulations from many concurrent worker threads at near-memory-bandwidth
//! speed, while keeping per-counter memory overhead bounded.
//!
//! ## The Problem
//!
//! A heavily threaded system (a build engine, a cache server, a scanner)
//! wants to count *everything*: operations launched, cache hits, bytes
//! moved, time spent in each phase. The naive design gives every counter a
//! global atomic, and every increment then fights all other cores for
//! exclusive ownership of that counter's cache line. Under high core
//! counts the resulting cache-line ping-pong turns a one-instruction
//! fetch-add into the hottest thing in the profile.
//!
//! The equally naive fix, replicating every counter per CPU with a full
//! padded cache line each, removes the contention but multiplies memory:
//! with hundreds of counters and 64 CPU slots, that is a padded line per
//! counter per slot, almost all of it padding.
//!
//! ## The Solution: A Shard Matrix
//!
//! This library shards *collections*, not individual counters. A
//! collection owns a 64-row matrix of 64-bit cells: one row per logical
//! CPU slot, one column per counter. Rows are padded to whole cache
//! lines, so no line is ever shared between two slots, while within a
//! row, eight counters pack into each line, amortizing the padding across
//! the whole counter set.
//!
//! ```text
//!                      one column per counter
//!                 ┌────┬────┬────┬────┬────┬─pad─┐
//!   slot 0  ────► │    │    │    │    │    │ ░░░ │
//!   slot 1  ────► │    │    │    │    │    │ ░░░ │   writers touch only
//!     ...         │    ...              ...      │   their own row
//!   slot 63 ────► │    │    │    │    │    │ ░░░ │
//!                 └────┴────┴────┴────┴────┴─────┘
//!                        ▲
//!                        └── readers fold one column over all rows
//! ```
//!
//! Every collection holds two such matrices of identical shape: one for
//! counts, one for duration ticks, so elapsed-time counters reuse the
//! same machinery.
//!
//! ### Design Principles
//!
//! 1. **Wait-free writes**: an increment is a single relaxed `fetch_add`
//!    on one cell (plus one per parent in the chain). No locks, no waits,
//!    no queues.
//! 2. **Fold-on-read**: reading a counter sums its column across all 64
//!    rows with acquire loads. Reads are the rare operation; they pay.
//!    A read is an eventually-correct bound, not an instantaneous total.
//! 3. **Typed schemas**: a [`counter_enum!`] declaration binds an enum to
//!    column indices once per process, tagging each member *numeric* or
//!    *stopwatch* and giving it a display name.
//! 4. **Composition**: collections link into parent trees (child adds
//!    propagate upward) and support a snapshot/merge/difference/sum
//!    algebra for computing per-phase deltas.
//!
//! ## Quick Start
//!
//! ```rust
//! use tallies::{counter_enum, CounterCollection};
//!
//! counter_enum! {
//!     pub enum ScanStats {
//!         FilesScanned,
//!         CacheHits,
//!         ScanDuration: stopwatch,
//!     }
//! }
//!
//! let counters = CounterCollection::<ScanStats>::new(None).unwrap();
//!
//! counters.increment(ScanStats::FilesScanned).unwrap();
//! counters.add(ScanStats::CacheHits, 3).unwrap();
//! {
//!     let _scope = counters.start(ScanStats::ScanDuration).unwrap();
//!     // ... scan ...
//! } // scope drop commits elapsed time + one call
//!
//! assert_eq!(counters.value(ScanStats::FilesScanned), 1);
//! assert_eq!(counters.value(ScanStats::ScanDuration), 1);
//!
//! // Flat name -> value export; stopwatch counters become "...Ms".
//! let stats = counters.statistics(Some("scan"));
//! assert_eq!(stats["scan.CacheHits"], 3);
//! assert!(stats.contains_key("scan.ScanDurationMs"));
//! ```
//!
//! ## Phase Deltas
//!
//! ```rust
//! use tallies::{counter_enum, CounterCollection};
//!
//! counter_enum! {
//!     pub enum Ops { Executed }
//! }
//!
//! let counters = CounterCollection::<Ops>::new(None).unwrap();
//! counters.add(Ops::Executed, 100).unwrap();
//!
//! let before = counters.snapshot();
//! counters.add(Ops::Executed, 50).unwrap();
//!
//! assert_eq!(counters.difference(&before, Ops::Executed), 50);
//! ```
//!
//! ## Memory Usage
//!
//! A collection with `N` counters uses two matrices of
//! `64 rows × ⌈N/8⌉` cache-line blocks. Sixteen counters cost ~32 KB
//! total, about 2 KB per counter including every per-CPU shard, versus
//! ~8 KB per counter for a fully padded per-CPU replica of each.
//!
//! ## Consistency Contract
//!
//! - Concurrent additions to one counter interleave at atomic-add
//!   granularity; no tearing across the 64-bit boundary.
//! - A reader's fold lies between the counter's totals at traversal start
//!   and end; under monotonic additions it is a consistent lower bound.
//! - No ordering is promised *across* counters.
//! - Counters are signed 64-bit; a wrapping add is detected and reported
//!   as [`CounterError::Overflow`] rather than silently corrupting sums.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `serde` | yes     | serializable [`snapshot`] export types |

pub mod clock;
pub mod collection;
pub mod counters;
pub mod error;
pub mod schema;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use collection::CounterCollection;
pub use counters::group::CounterGroup;
pub use counters::handle::Counter;
pub use counters::stopwatch::Stopwatch;
pub use error::{CounterError, Result};
pub use schema::{CounterDescriptor, CounterEnum, CounterKind, CounterSchema};

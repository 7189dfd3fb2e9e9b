//! Unified error type for counter operations.
//!
//! All fallible operations in this crate surface the same [`CounterError`]
//! enum, so callers can keep one error path whether they hit a schema
//! problem at binding time or an overflow on the hot path.
//!
//! Readers never fail: folding a column, enumerating counters, and
//! rendering a collection are all infallible by contract.

use thiserror::Error;

/// Unified error type for all counter operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CounterError {
    /// A 64-bit add wrapped past the sign boundary.
    ///
    /// The faulting cell is left in an implementation-defined state; every
    /// other column of the collection remains usable.
    #[error("counter `{counter}` overflowed while adding {delta}")]
    Overflow {
        /// Display name of the faulting counter.
        counter: String,
        /// The delta whose addition wrapped.
        delta: i64,
    },

    /// An enum could not be bound as a counter schema: it is non-dense,
    /// has duplicate values, or its cardinality exceeds 16 bits.
    #[error("invalid counter schema: {0}")]
    InvalidCounterSchema(String),

    /// A stopwatch-only operation was invoked on a numeric counter.
    #[error("counter `{counter}` is not a stopwatch counter")]
    WrongCounterType {
        /// Display name of the counter the operation targeted.
        counter: String,
    },

    /// Merge, difference, or sum was attempted across collections whose
    /// schemas differ in shape.
    #[error("counter schemas are incompatible ({left} vs {right} columns)")]
    SchemaMismatch {
        /// Column count of the left-hand collection.
        left: u16,
        /// Column count of the right-hand collection.
        right: u16,
    },
}

/// Result type for counter operations.
pub type Result<T> = std::result::Result<T, CounterError>;

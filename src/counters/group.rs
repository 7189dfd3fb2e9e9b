//! The untyped collection core.
//!
//! A [`CounterGroup`] owns two same-shape shard matrices (one for counts,
//! one for duration ticks) plus the immutable schema tables and an
//! optional parent link. All column ids are dense `u16` values; the typed
//! facade in [`CounterCollection`](crate::CounterCollection) maps enum
//! members onto them.
//!
//! # Consistency contract
//!
//! Writes are single relaxed fetch-adds; reads fold a column over all 64
//! rows with acquire loads. Additions landing during a fold may be
//! partially summed, so a read returns an eventually-correct value bounded
//! by the column's sums at traversal start and end. No ordering is
//! promised across different counters.
//!
//! # Parent propagation
//!
//! Collections form a tree: every add recurses into the parent with the
//! same column and delta. Propagation is best-effort: if the parent add
//! faults (overflow), the error surfaces on the originating call *after*
//! the child's own cell has committed, and is not rolled back.

use std::sync::Arc;

use crate::counters::handle::Counter;
use crate::counters::matrix::ShardMatrix;
use crate::counters::{current_slot, SHARD_ROWS};
use crate::error::CounterError;
use crate::schema::CounterSchema;

/// The untyped core of a counter collection: a counts matrix, a durations
/// matrix, the shared schema, and an optional parent.
pub struct CounterGroup {
    counts: ShardMatrix,
    durations: ShardMatrix,
    schema: Arc<CounterSchema>,
    parent: Option<Arc<CounterGroup>>,
}

impl CounterGroup {
    /// Creates a zeroed group for `schema`, optionally linked under a
    /// parent whose schema must have the same shape.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::SchemaMismatch`] if the parent's shape
    /// differs.
    pub fn new(
        schema: Arc<CounterSchema>,
        parent: Option<Arc<CounterGroup>>,
    ) -> crate::Result<Self> {
        if let Some(parent) = &parent {
            if !parent.schema.shape_matches(&schema) {
                return Err(CounterError::SchemaMismatch {
                    left: schema.columns(),
                    right: parent.schema.columns(),
                });
            }
        }
        let columns = schema.columns();
        Ok(CounterGroup {
            counts: ShardMatrix::new(columns),
            durations: ShardMatrix::new(columns),
            schema,
            parent,
        })
    }

    /// The schema shared by every collection of this shape.
    #[inline]
    pub fn schema(&self) -> &Arc<CounterSchema> {
        &self.schema
    }

    /// The parent this group propagates into, if any.
    #[inline]
    pub fn parent(&self) -> Option<&Arc<CounterGroup>> {
        self.parent.as_ref()
    }

    /// Number of columns in both matrices.
    #[inline]
    pub fn columns(&self) -> u16 {
        self.counts.columns()
    }

    /// A [`Counter`] handle bound to column `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range; handles are only constructed for
    /// valid columns.
    pub fn counter(&self, id: u16) -> Counter<'_> {
        Counter::new(self, id)
    }

    /// Adds `delta` to the count cell of column `id` in this thread's row,
    /// then propagates into the parent chain.
    ///
    /// A zero delta returns immediately: no atomic write, no overflow
    /// check, no propagation.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Overflow`] if the add wraps past the sign
    /// boundary at any level of the chain. The faulting cell stays
    /// wrapped; adds already committed further down are not rolled back.
    pub fn add_count(&self, id: u16, delta: i64) -> crate::Result<()> {
        if delta == 0 {
            return Ok(());
        }
        self.add_cell(&self.counts, id, delta)?;
        match &self.parent {
            Some(parent) => parent.add_count(id, delta),
            None => Ok(()),
        }
    }

    /// Adds `delta` raw ticks to the duration cell of column `id`, with
    /// the same fast path, overflow policy, and propagation as
    /// [`add_count`](Self::add_count).
    pub fn add_duration(&self, id: u16, delta: i64) -> crate::Result<()> {
        if delta == 0 {
            return Ok(());
        }
        self.add_cell(&self.durations, id, delta)?;
        match &self.parent {
            Some(parent) => parent.add_duration(id, delta),
            None => Ok(()),
        }
    }

    #[inline]
    fn add_cell(&self, matrix: &ShardMatrix, id: u16, delta: i64) -> crate::Result<()> {
        let previous = matrix.fetch_add(current_slot(), id, delta);
        let new = previous.wrapping_add(delta);
        // Sign-inverted wrap: adding a positive delta can only decrease the
        // cell (and vice versa) by wrapping past the 64-bit boundary.
        if (delta > 0 && new < previous) || (delta < 0 && new > previous) {
            return Err(CounterError::Overflow {
                counter: self.schema.name(id).to_string(),
                delta,
            });
        }
        Ok(())
    }

    /// Folded count of column `id` across all rows. Never fails; saturates
    /// at the i64 boundary.
    #[inline]
    pub fn read_count(&self, id: u16) -> i64 {
        self.counts.fold_column(id)
    }

    /// Folded duration ticks of column `id` across all rows.
    #[inline]
    pub fn read_duration(&self, id: u16) -> i64 {
        self.durations.fold_column(id)
    }

    /// Atomically adds every cell of `other` into the matching cell of
    /// `self`, for both matrices. The parent link is not traversed; the
    /// merge target owns propagation policy.
    ///
    /// # Errors
    ///
    /// [`CounterError::SchemaMismatch`] (before any state change) if the
    /// shapes differ; [`CounterError::Overflow`] if a cell add wraps, in
    /// which case cells already merged stay merged.
    pub fn merge_from(&self, other: &CounterGroup) -> crate::Result<()> {
        self.check_shape(other)?;
        self.merge_matrix(&self.counts, &other.counts)?;
        self.merge_matrix(&self.durations, &other.durations)
    }

    fn merge_matrix(&self, target: &ShardMatrix, source: &ShardMatrix) -> crate::Result<()> {
        for row in 0..SHARD_ROWS {
            for column in 0..target.columns() {
                let delta = source.load_relaxed(row, column);
                if delta == 0 {
                    continue;
                }
                let previous = target.fetch_add(row, column, delta);
                let new = previous.wrapping_add(delta);
                if (delta > 0 && new < previous) || (delta < 0 && new > previous) {
                    return Err(CounterError::Overflow {
                        counter: self.schema.name(column).to_string(),
                        delta,
                    });
                }
            }
        }
        Ok(())
    }

    /// An independent, parent-less copy of this group's current values.
    ///
    /// The copy is a fuzzy point-in-time view: cells are read one by one
    /// while writers may still be running, within the documented
    /// eventual-consistency bound.
    pub fn snapshot(&self) -> CounterGroup {
        let frozen = CounterGroup {
            counts: ShardMatrix::new(self.columns()),
            durations: ShardMatrix::new(self.columns()),
            schema: Arc::clone(&self.schema),
            parent: None,
        };
        frozen.counts.copy_from(&self.counts);
        frozen.durations.copy_from(&self.durations);
        frozen
    }

    /// `read_count(id) - other.read_count(id)`, saturating.
    ///
    /// # Errors
    ///
    /// [`CounterError::SchemaMismatch`] if the shapes differ.
    pub fn count_difference(&self, other: &CounterGroup, id: u16) -> crate::Result<i64> {
        self.check_shape(other)?;
        Ok(self.read_count(id).saturating_sub(other.read_count(id)))
    }

    /// `read_duration(id) - other.read_duration(id)`, saturating.
    ///
    /// # Errors
    ///
    /// [`CounterError::SchemaMismatch`] if the shapes differ.
    pub fn duration_difference(&self, other: &CounterGroup, id: u16) -> crate::Result<i64> {
        self.check_shape(other)?;
        Ok(self.read_duration(id).saturating_sub(other.read_duration(id)))
    }

    /// Element-wise sum of two same-shape groups into a fresh, parent-less
    /// group: a copy of `a` merged with `b`.
    ///
    /// # Errors
    ///
    /// [`CounterError::SchemaMismatch`] if the shapes differ;
    /// [`CounterError::Overflow`] if any cell sum wraps.
    pub fn sum(a: &CounterGroup, b: &CounterGroup) -> crate::Result<CounterGroup> {
        a.check_shape(b)?;
        let total = a.snapshot();
        total.merge_from(b)?;
        Ok(total)
    }

    fn check_shape(&self, other: &CounterGroup) -> crate::Result<()> {
        if !self.schema.shape_matches(&other.schema) {
            return Err(CounterError::SchemaMismatch {
                left: self.columns(),
                right: other.columns(),
            });
        }
        Ok(())
    }
}

impl Clone for CounterGroup {
    /// Deep copy: fresh matrices holding the current cell values, sharing
    /// the schema and the *same* parent link. The copy itself propagates
    /// nothing to that parent; only subsequent adds on the clone do.
    fn clone(&self) -> Self {
        let copy = CounterGroup {
            counts: ShardMatrix::new(self.columns()),
            durations: ShardMatrix::new(self.columns()),
            schema: Arc::clone(&self.schema),
            parent: self.parent.clone(),
        };
        copy.counts.copy_from(&self.counts);
        copy.durations.copy_from(&self.durations);
        copy
    }
}

impl std::fmt::Debug for CounterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterGroup")
            .field("columns", &self.columns())
            .field("has_parent", &self.parent.is_some())
            .field("counts", &self.counts)
            .field("durations", &self.durations)
            .finish()
    }
}

//! The shard matrix: a 64-row table of atomic 64-bit cells.
//!
//! Layout is the whole point of this type. A matrix is one contiguous
//! allocation of cache-line blocks, each block holding [`LINE_CELLS`]
//! cells. A row owns a whole number of blocks (`lines_per_row`), so:
//!
//! - no cache line is ever shared by two rows, so writers pinned to
//!   different row slots cannot false-share;
//! - up to [`LINE_CELLS`] counters pack into one block of the row,
//!   recovering the memory a padded-cell-per-counter design would waste;
//! - cell `(row, column)` is found by plain arithmetic, with no per-row
//!   pointer chasing.
//!
//! Writes are relaxed fetch-adds; column reads fold all 64 rows with
//! acquire loads and saturating accumulation. The matrix knows nothing of
//! schemas, parents, or overflow policy; that lives in
//! [`CounterGroup`](super::group::CounterGroup).

use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use super::SHARD_ROWS;

/// Cells per cache-line block: a 64-byte line holds eight 64-bit cells.
pub(crate) const LINE_CELLS: usize = 8;

/// A fixed-shape, row-major table of atomic cells, padded so that row
/// boundaries coincide with cache-line boundaries.
pub(crate) struct ShardMatrix {
    lines: Box<[CachePadded<[AtomicI64; LINE_CELLS]>]>,
    columns: u16,
    lines_per_row: usize,
}

impl ShardMatrix {
    /// Allocates a zeroed matrix of [`SHARD_ROWS`] rows by `columns` cells,
    /// each row padded up to whole cache-line blocks.
    pub(crate) fn new(columns: u16) -> Self {
        let lines_per_row = (columns as usize).div_ceil(LINE_CELLS).max(1);
        let lines: Box<[CachePadded<[AtomicI64; LINE_CELLS]>]> = (0..SHARD_ROWS * lines_per_row)
            .map(|_| CachePadded::new(std::array::from_fn(|_| AtomicI64::new(0))))
            .collect();
        ShardMatrix {
            lines,
            columns,
            lines_per_row,
        }
    }

    #[inline]
    pub(crate) fn columns(&self) -> u16 {
        self.columns
    }

    #[inline]
    fn cell(&self, row: usize, column: u16) -> &AtomicI64 {
        debug_assert!(row < SHARD_ROWS);
        assert!(
            column < self.columns,
            "column {column} out of range (matrix has {})",
            self.columns
        );
        let column = column as usize;
        &self.lines[row * self.lines_per_row + column / LINE_CELLS][column % LINE_CELLS]
    }

    /// Adds `delta` into one cell and returns the previous value. Relaxed:
    /// counters establish no happens-before edges with other memory.
    #[inline]
    pub(crate) fn fetch_add(&self, row: usize, column: u16, delta: i64) -> i64 {
        self.cell(row, column).fetch_add(delta, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn load_relaxed(&self, row: usize, column: u16) -> i64 {
        self.cell(row, column).load(Ordering::Relaxed)
    }

    /// Folds one column across all rows. Acquire loads let readers observe
    /// writes eventually; the sum saturates at the i64 boundary so readers
    /// never fail.
    pub(crate) fn fold_column(&self, column: u16) -> i64 {
        let mut sum: i64 = 0;
        for row in 0..SHARD_ROWS {
            sum = sum.saturating_add(self.cell(row, column).load(Ordering::Acquire));
        }
        sum
    }

    /// Bulk-copies every cell from a same-shape matrix. Non-atomic as a
    /// whole: concurrent writers produce a fuzzy snapshot, which callers
    /// of clone/snapshot accept.
    pub(crate) fn copy_from(&self, other: &ShardMatrix) {
        assert_eq!(self.columns, other.columns, "matrix shapes differ");
        for (dst, src) in self.lines.iter().zip(other.lines.iter()) {
            for (dst_cell, src_cell) in dst.iter().zip(src.iter()) {
                dst_cell.store(src_cell.load(Ordering::Relaxed), Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for ShardMatrix {
    /// Shows shape and non-zero cells only; a 64-row dump is useless.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShardMatrix({}x{}){{", SHARD_ROWS, self.columns)?;
        for row in 0..SHARD_ROWS {
            for column in 0..self.columns {
                let value = self.load_relaxed(row, column);
                if value != 0 {
                    write!(f, " [{row},{column}]:{value}")?;
                }
            }
        }
        write!(f, " }}")
    }
}

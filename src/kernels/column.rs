//! Column-chunk-outermost GEMM tilings.
//!
//! All four strategies fix a 16-wide chunk of output columns first and
//! compute that entire `N × 16` stripe of C before moving to the next chunk.
//! A stripe only depends on the matching `N × 16` stripe of B, which is what
//! lets the parallel drivers hand out column chunks as independent units of
//! work.
//!
//! | sweep            | loop nest inside one column chunk                          |
//! |------------------|------------------------------------------------------------|
//! | `Rows`           | row → tile → tile_row → idx                                |
//! | `PartialRows`    | row_chunk → row (16) → tile → tile_row → idx               |
//! | `MultiOutput`    | row_chunk → tile → row (16) → tile_row → idx               |
//! | `ForwardBackward`| row pair → tiles ascending for `r`, descending for `r + 1` |
//!
//! `MultiOutput` applies every B tile to 16 output rows before the tile is
//! evicted, cutting B traffic by the row-batch size.

use std::fmt;

use crate::element::Element;
use crate::kernels::{assert_square, assert_tiled, DisjointMut};
use crate::TILE;

/// Loop order used inside one 16-wide column chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnSweep {
    /// Every row of the chunk, each walking all reduction tiles.
    Rows,
    /// Rows grouped in 16-row chunks, each row walking all reduction tiles.
    PartialRows,
    /// Rows grouped in 16-row chunks; each reduction tile is applied to all 16 rows.
    MultiOutput,
    /// Row pairs: the first row walks the tiles forward, the second backward.
    ForwardBackward,
}

impl ColumnSweep {
    /// Computes columns `col_chunk..col_chunk + 16` of C.
    ///
    /// # Safety
    ///
    /// No other thread may access those columns of `out` while this runs.
    /// `out` must hold `n * n` elements, `a`/`b` are bounds-checked.
    #[inline]
    pub unsafe fn run_chunk<T: Element>(
        self,
        a: &[T],
        b: &[T],
        out: DisjointMut<'_, T>,
        n: usize,
        col_chunk: usize,
    ) {
        // SAFETY: forwarded from the caller.
        unsafe {
            match self {
                ColumnSweep::Rows => rows_chunk(a, b, out, n, col_chunk),
                ColumnSweep::PartialRows => partial_rows_chunk(a, b, out, n, col_chunk),
                ColumnSweep::MultiOutput => multi_output_chunk(a, b, out, n, col_chunk),
                ColumnSweep::ForwardBackward => forward_backward_chunk(a, b, out, n, col_chunk),
            }
        }
    }

    /// Computes every column chunk yielded by `chunks`.
    ///
    /// This is the per-worker body of the column-partitioned parallel kernels:
    /// `chunks` is a static range, a strided sequence, or the claims drawn from
    /// a shared [`ChunkCursor`](crate::partition::ChunkCursor).
    ///
    /// Returns the number of chunks computed.
    ///
    /// # Safety
    ///
    /// The chunks must be multiples of 16 below `n`, and no other thread may
    /// be computing any of them at the same time.
    pub unsafe fn run_chunks<T, I>(
        self,
        a: &[T],
        b: &[T],
        out: DisjointMut<'_, T>,
        n: usize,
        chunks: I,
    ) -> usize
    where
        T: Element,
        I: IntoIterator<Item = usize>,
    {
        let mut done = 0;
        for col_chunk in chunks {
            debug_assert_eq!(col_chunk % TILE, 0, "column chunk {col_chunk} is not tile aligned");
            // SAFETY: forwarded from the caller.
            unsafe { self.run_chunk(a, b, out, n, col_chunk) };
            done += 1;
        }
        done
    }

    /// Single-threaded run over all column chunks.
    ///
    /// # Panics
    ///
    /// Panics if the slice sizes don't match `n * n` or if `n` is not a
    /// multiple of [`TILE`].
    pub fn run<T: Element>(self, a: &[T], b: &[T], c: &mut [T], n: usize) {
        assert_square(a, b, c.len(), n);
        assert_tiled(n);
        let out = DisjointMut::new(c);
        // SAFETY: `c` is exclusively borrowed and only this thread writes to it.
        unsafe { self.run_chunks(a, b, out, n, (0..n).step_by(TILE)) };
    }

    /// Stable name for reports.
    pub fn name(self) -> &'static str {
        match self {
            ColumnSweep::Rows => "rows",
            ColumnSweep::PartialRows => "partial_rows",
            ColumnSweep::MultiOutput => "multi_output",
            ColumnSweep::ForwardBackward => "forward_backward",
        }
    }
}

impl fmt::Display for ColumnSweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column-blocked multiplication: each 16-column chunk, every row.
pub fn blocked_column<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    ColumnSweep::Rows.run(a, b, c, n);
}

/// Column-blocked multiplication with rows visited in 16-row chunks.
pub fn partial_column<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    ColumnSweep::PartialRows.run(a, b, c, n);
}

/// Multi-output column-blocked multiplication.
pub fn multi_output<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    ColumnSweep::MultiOutput.run(a, b, c, n);
}

/// Column-blocked multiplication alternating the reduction direction between
/// adjacent rows.
///
/// The summation order of odd rows is reversed, so results match
/// [`blocked_column`] exactly only when every partial sum is exactly
/// representable (e.g. small integer inputs).
pub fn forward_backward<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    ColumnSweep::ForwardBackward.run(a, b, c, n);
}

// --- Per-chunk loop nests ---

/// `c_seg[idx] += Σ_{tile_row} A[row][tile + tile_row] * B[tile + tile_row][col_chunk + idx]`
/// for one reduction tile, walking tile rows in the order given.
#[inline(always)]
fn apply_tile<T: Element>(
    a_row: &[T],
    b: &[T],
    c_seg: &mut [T],
    n: usize,
    col_chunk: usize,
    tile: usize,
    tile_rows: impl Iterator<Item = usize>,
) {
    for tile_row in tile_rows {
        let a_val = a_row[tile + tile_row];
        let b_seg = &b[(tile + tile_row) * n + col_chunk..][..TILE];
        for idx in 0..TILE {
            c_seg[idx] += a_val * b_seg[idx];
        }
    }
}

unsafe fn rows_chunk<T: Element>(
    a: &[T],
    b: &[T],
    out: DisjointMut<'_, T>,
    n: usize,
    col_chunk: usize,
) {
    for row in 0..n {
        let a_row = &a[row * n..(row + 1) * n];
        // SAFETY: this thread owns columns col_chunk..col_chunk + 16.
        let c_seg = unsafe { out.segment(row * n + col_chunk, TILE) };
        for tile in (0..n).step_by(TILE) {
            apply_tile(a_row, b, c_seg, n, col_chunk, tile, 0..TILE);
        }
    }
}

unsafe fn partial_rows_chunk<T: Element>(
    a: &[T],
    b: &[T],
    out: DisjointMut<'_, T>,
    n: usize,
    col_chunk: usize,
) {
    for row_chunk in (0..n).step_by(TILE) {
        for row in row_chunk..row_chunk + TILE {
            let a_row = &a[row * n..(row + 1) * n];
            // SAFETY: this thread owns columns col_chunk..col_chunk + 16.
            let c_seg = unsafe { out.segment(row * n + col_chunk, TILE) };
            for tile in (0..n).step_by(TILE) {
                apply_tile(a_row, b, c_seg, n, col_chunk, tile, 0..TILE);
            }
        }
    }
}

unsafe fn multi_output_chunk<T: Element>(
    a: &[T],
    b: &[T],
    out: DisjointMut<'_, T>,
    n: usize,
    col_chunk: usize,
) {
    for row_chunk in (0..n).step_by(TILE) {
        for tile in (0..n).step_by(TILE) {
            // The same B tile is reused for all 16 rows of the row chunk.
            for row in row_chunk..row_chunk + TILE {
                let a_row = &a[row * n..(row + 1) * n];
                // SAFETY: this thread owns columns col_chunk..col_chunk + 16.
                let c_seg = unsafe { out.segment(row * n + col_chunk, TILE) };
                apply_tile(a_row, b, c_seg, n, col_chunk, tile, 0..TILE);
            }
        }
    }
}

unsafe fn forward_backward_chunk<T: Element>(
    a: &[T],
    b: &[T],
    out: DisjointMut<'_, T>,
    n: usize,
    col_chunk: usize,
) {
    for row in (0..n).step_by(2) {
        let a_row = &a[row * n..(row + 1) * n];
        // SAFETY: this thread owns columns col_chunk..col_chunk + 16.
        let c_seg = unsafe { out.segment(row * n + col_chunk, TILE) };
        for tile in (0..n).step_by(TILE) {
            apply_tile(a_row, b, c_seg, n, col_chunk, tile, 0..TILE);
        }

        // Tiles n-16, ..., 16, 0 and tile rows 15, ..., 1, 0: both reversed
        // sweeps include their zero iteration.
        let a_next = &a[(row + 1) * n..(row + 2) * n];
        // SAFETY: as above.
        let c_next = unsafe { out.segment((row + 1) * n + col_chunk, TILE) };
        for tile in (0..n).step_by(TILE).rev() {
            apply_tile(a_next, b, c_next, n, col_chunk, tile, (0..TILE).rev());
        }
    }
}

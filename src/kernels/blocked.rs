//! Row-blocked GEMM.
//!
//! The triple loop is split into five levels:
//!
//! ```text
//! for row in 0..n:                        // one row of C at a time
//!     for block in (0..n).step_by(16):    // 16 outputs of that row
//!         for chunk in (0..n).step_by(16):   // 16-deep slice of the reduction
//!             for sub in 0..16:              // one row of the B tile
//!                 for idx in 0..16:          // one C output
//!                     C[row][block+idx] += A[row][chunk+sub] * B[chunk+sub][block+idx]
//! ```
//!
//! The innermost loop reads 16 contiguous elements of B and writes 16
//! contiguous elements of C, and a 16×16 tile of B stays hot while it is
//! swept by consecutive `sub` iterations.

use crate::element::Element;
use crate::kernels::{assert_square, assert_tiled};
use crate::TILE;

/// Row-blocked multiplication of the whole matrix.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n` or if `n` is not a multiple of [`TILE`].
pub fn blocked<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    assert_square(a, b, c.len(), n);
    assert_tiled(n);
    blocked_rows(a, b, c, n, 0);
}

/// Row-blocked multiplication of rows `start_row..start_row + c_rows.len() / n`.
///
/// `c_rows` holds only those rows of C. This is the per-worker body of
/// [`parallel_blocked`](crate::parallel::parallel_blocked), which hands every
/// worker a disjoint row slab of C.
///
/// # Panics
///
/// Panics if `n` is not a multiple of [`TILE`] or the rows run past `n`.
pub fn blocked_rows<T: Element>(a: &[T], b: &[T], c_rows: &mut [T], n: usize, start_row: usize) {
    assert_tiled(n);
    for (local, c_row) in c_rows.chunks_exact_mut(n).enumerate() {
        let a_row = &a[(start_row + local) * n..(start_row + local + 1) * n];
        for block in (0..n).step_by(TILE) {
            let c_block = &mut c_row[block..block + TILE];
            for chunk in (0..n).step_by(TILE) {
                for sub_chunk in 0..TILE {
                    let a_val = a_row[chunk + sub_chunk];
                    let b_row = &b[(chunk + sub_chunk) * n + block..][..TILE];
                    for idx in 0..TILE {
                        c_block[idx] += a_val * b_row[idx];
                    }
                }
            }
        }
    }
}

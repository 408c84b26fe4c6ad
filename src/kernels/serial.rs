//! Serial triple-loop kernels.
//!
//! These are the baselines every other kernel is checked and timed against.

use crate::element::Element;
use crate::kernels::{assert_square, reduce};

/// Naive matrix multiplication using row-col-k loop order.
///
/// The textbook triple loop. The innermost loop walks a column of B, i.e.
/// with stride `n`, so every iteration touches a new cache line once N is
/// large. Use this as the correctness reference, not for performance.
///
/// Works for any `n`, not only tile multiples.
///
/// # Arguments
///
/// * `a` - Matrix A (n × n), row-major
/// * `b` - Matrix B (n × n), row-major
/// * `c` - Matrix C (n × n), row-major, accumulated into (C += A * B)
/// * `n` - Matrix dimension
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n`.
pub fn naive<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) {
    assert_square(a, b, c.len(), n);
    naive_rows(a, b, c, n, 0);
}

/// The naive loop restricted to rows `start_row..start_row + c_rows.len() / n`.
///
/// `c_rows` holds only those rows of C, so row `start_row` of the full
/// matrix is row 0 of `c_rows`. This is the per-worker body of
/// [`parallel_naive`](crate::parallel::parallel_naive).
pub fn naive_rows<T: Element>(a: &[T], b: &[T], c_rows: &mut [T], n: usize, start_row: usize) {
    for (local, c_row) in c_rows.chunks_exact_mut(n).enumerate() {
        let row = start_row + local;
        for (col, c_elem) in c_row.iter_mut().enumerate() {
            for k in 0..n {
                *c_elem += a[row * n + k] * b[k * n + col];
            }
        }
    }
}

/// Naive loop order with B supplied already transposed.
///
/// `bt[col * n + k]` holds `B[k][col]`, so the inner loop becomes a dot
/// product over two contiguous rows. Comparing this with [`naive`] measures
/// the benefit of data layout alone.
///
/// # Arguments
///
/// * `bt` - Transposed matrix Bᵀ (n × n), row-major
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n`.
pub fn transposed<T: Element>(a: &[T], bt: &[T], c: &mut [T], n: usize) {
    assert_square(a, bt, c.len(), n);
    for (row, c_row) in c.chunks_exact_mut(n).enumerate() {
        for (col, c_elem) in c_row.iter_mut().enumerate() {
            for k in 0..n {
                *c_elem += a[row * n + k] * bt[col * n + k];
            }
        }
    }
}

/// [`transposed`] with the inner dot product reduced in fixed-width groups of
/// `W` lanes (see [`reduce::dot`]).
///
/// The summation order differs from [`naive`], so results agree within the
/// element tolerance rather than bit for bit.
pub fn transposed_lanes<T: Element, const W: usize>(a: &[T], bt: &[T], c: &mut [T], n: usize) {
    assert_square(a, bt, c.len(), n);
    for (row, c_row) in c.chunks_exact_mut(n).enumerate() {
        let a_row = &a[row * n..(row + 1) * n];
        for (col, c_elem) in c_row.iter_mut().enumerate() {
            *c_elem += reduce::dot::<T, W>(a_row, &bt[col * n..(col + 1) * n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2x2_multiply() {
        let a = vec![1.0f64, 2.0, 3.0, 4.0];
        let b = vec![5.0f64, 6.0, 7.0, 8.0];
        let mut c = vec![0.0; 4];
        naive(&a, &b, &mut c, 2);
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_accumulates_into_c() {
        let a = vec![1.0f32, 0.0, 0.0, 1.0];
        let b = vec![1.0f32, 2.0, 3.0, 4.0];
        let mut c = vec![10.0f32, 20.0, 30.0, 40.0];
        naive(&a, &b, &mut c, 2);
        assert_eq!(c, vec![11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn test_transposed_matches_naive_odd_size() {
        let n = 7;
        let a: Vec<f64> = (0..n * n).map(|i| (i % 10) as f64).collect();
        let b: Vec<f64> = (0..n * n).map(|i| ((i + 3) % 7) as f64).collect();
        let mut bt = vec![0.0; n * n];
        for r in 0..n {
            for c in 0..n {
                bt[c * n + r] = b[r * n + c];
            }
        }

        let mut expected = vec![0.0; n * n];
        let mut plain = vec![0.0; n * n];
        let mut lanes = vec![0.0; n * n];
        naive(&a, &b, &mut expected, n);
        transposed(&a, &bt, &mut plain, n);
        transposed_lanes::<f64, 4>(&a, &bt, &mut lanes, n);

        assert_eq!(expected, plain);
        assert_eq!(expected, lanes);
    }

    #[test]
    fn test_naive_rows_writes_only_its_rows() {
        let n = 4;
        let a = vec![1.0f64; n * n];
        let b = vec![1.0f64; n * n];
        let mut c = vec![0.0; n * n];
        naive_rows(&a, &b, &mut c[n..3 * n], n, 1);
        assert!(c[..n].iter().all(|&x| x == 0.0));
        assert!(c[n..3 * n].iter().all(|&x| x == 4.0));
        assert!(c[3 * n..].iter().all(|&x| x == 0.0));
    }

    #[test]
    #[should_panic(expected = "B: expected")]
    fn test_size_mismatch_panics() {
        let mut c = vec![0.0f32; 4];
        naive(&[0.0; 4], &[0.0; 3], &mut c, 2);
    }
}

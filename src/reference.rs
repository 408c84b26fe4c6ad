//! Vendor reference GEMM.
//!
//! Wraps `ndarray`'s general matrix multiply (backed by `matrixmultiply`)
//! so the hand-written kernels can be timed against a tuned library
//! implementation on the same buffers.

use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

use crate::element::Element;
use crate::error::{validation_error, Result};

/// Computes `C = A × B` with the library GEMM (`alpha = 1`, `beta = 0`).
///
/// Unlike the hand-written kernels this **overwrites** C instead of
/// accumulating into it. On zeroed C the two are the same.
///
/// # Errors
///
/// Returns a validation error if any buffer does not hold `n * n` elements.
pub fn reference_gemm<T: Element>(a: &[T], b: &[T], c: &mut [T], n: usize) -> Result<()> {
    let len = n * n;
    for (name, actual) in [("A", a.len()), ("B", b.len()), ("C", c.len())] {
        if actual != len {
            return Err(validation_error(format!(
                "{name}: expected {n}x{n}={len} elements, got {actual}"
            )));
        }
    }

    let shape = (n, n);
    let a = ArrayView2::from_shape(shape, a).map_err(|e| validation_error(format!("A: {e}")))?;
    let b = ArrayView2::from_shape(shape, b).map_err(|e| validation_error(format!("B: {e}")))?;
    let mut c =
        ArrayViewMut2::from_shape(shape, c).map_err(|e| validation_error(format!("C: {e}")))?;

    general_mat_mul(T::one(), &a, &b, T::zero(), &mut c);
    Ok(())
}

//! Scalar types the kernels are generic over.

use std::fmt::{Debug, Display};
use std::ops::AddAssign;

use ndarray::LinalgScalar;
use num::Float;
use rand::distr::uniform::SampleUniform;

/// A floating-point matrix element.
///
/// Implemented for `f32` and `f64`. The bounds cover what the kernels need
/// (`+=` accumulation, sharing across worker threads), what the reference
/// GEMM needs (`LinalgScalar`) and what matrix generation needs
/// (`SampleUniform`).
pub trait Element:
    Float + LinalgScalar + AddAssign + SampleUniform + Send + Sync + Debug + Display + 'static
{
    /// Short name used in reports (`"f32"` or `"f64"`).
    const NAME: &'static str;

    /// Relative tolerance when comparing a kernel's output with the naive kernel.
    const RELATIVE_TOLERANCE: f64;
}

impl Element for f32 {
    const NAME: &'static str = "f32";
    const RELATIVE_TOLERANCE: f64 = 1e-4;
}

impl Element for f64 {
    const NAME: &'static str = "f64";
    const RELATIVE_TOLERANCE: f64 = 1e-9;
}

/// Largest element-wise error between `expected` and `actual`, measured
/// against `1 + scale[i]`.
///
/// For a GEMM result the natural scale of element `(i, j)` is
/// `Σ_k |A[i][k] · B[k][j]|`: rounding error grows with the magnitude of
/// the terms that were summed, not with the (possibly cancelled) result.
///
/// Returns `f64::INFINITY` if the slices differ in length or any error is NaN.
pub fn max_scaled_error<T: Element>(expected: &[T], actual: &[T], scale: &[T]) -> f64 {
    if expected.len() != actual.len() || expected.len() != scale.len() {
        return f64::INFINITY;
    }

    expected
        .iter()
        .zip(actual)
        .zip(scale)
        .map(|((&e, &a), &s)| {
            let e = e.to_f64().unwrap_or(f64::NAN);
            let a = a.to_f64().unwrap_or(f64::NAN);
            let s = s.to_f64().unwrap_or(f64::NAN);
            let err = (e - a).abs() / (1.0 + s.abs());
            if err.is_nan() {
                f64::INFINITY
            } else {
                err
            }
        })
        .fold(0.0, f64::max)
}

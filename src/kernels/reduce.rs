//! Fixed-width lane reduction.
//!
//! A portable stand-in for a hardware dot-product instruction: products are
//! accumulated in `W` independent lanes, and the lanes are folded into one
//! sum at the end. With plain arrays of a constant width the compiler maps
//! the lanes onto whatever vector registers the target has, so the same code
//! serves SSE (`W = 2` doubles), AVX (`W = 4`) and wider units.

use crate::element::Element;

/// Dot product of `x` and `y` reduced in groups of `W` lanes.
///
/// Elements past the last full group are added in a scalar tail, so any
/// length works.
///
/// # Panics
///
/// Panics if `x` and `y` differ in length or if `W == 0`.
#[inline]
pub fn dot<T: Element, const W: usize>(x: &[T], y: &[T]) -> T {
    assert!(W > 0, "lane width must be positive");
    assert_eq!(x.len(), y.len(), "dot product operands differ in length");

    let mut lanes = [T::zero(); W];

    let x_groups = x.chunks_exact(W);
    let y_groups = y.chunks_exact(W);
    let x_tail = x_groups.remainder();
    let y_tail = y_groups.remainder();

    for (xg, yg) in x_groups.zip(y_groups) {
        for lane in 0..W {
            lanes[lane] += xg[lane] * yg[lane];
        }
    }

    let mut sum = horizontal_sum(&lanes);
    for (&xi, &yi) in x_tail.iter().zip(y_tail) {
        sum += xi * yi;
    }
    sum
}

/// Folds the partial sums pairwise, the way a vector unit reduces its lanes.
#[inline]
fn horizontal_sum<T: Element, const W: usize>(lanes: &[T; W]) -> T {
    let mut buf = *lanes;
    let mut width = W;
    while width > 1 {
        let half = width / 2;
        for i in 0..half {
            buf[i] = buf[i] + buf[i + half];
        }
        // an odd lane out is carried into lane 0
        if width % 2 == 1 {
            buf[0] = buf[0] + buf[width - 1];
        }
        width = half;
    }
    buf[0]
}

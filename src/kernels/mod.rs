//! Single-threaded GEMM kernels.
//!
//! Every kernel computes `C += A × B` for square row-major `N × N` matrices
//! and accumulates into `C`: a non-zero `C` is added to, never overwritten.
//!
//! - [`serial`]: naive and transposed triple loops, the correctness baseline.
//! - [`blocked`]: row-blocked 16×16 tiling.
//! - [`column`]: column-chunk-outermost tilings (column, partial-column,
//!   multi-output and forward/backward).
//! - [`reduce`]: the fixed-width lane dot product used by the transposed kernel.
//!
//! The blocked kernels require `N` to be a multiple of [`TILE`](crate::TILE).

use std::marker::PhantomData;

pub mod blocked;
pub mod column;
pub mod reduce;
pub mod serial;

/// Shared write handle over an output matrix whose elements are updated
/// by several workers at once, each touching a disjoint set of indices.
///
/// Row partitions can hand every worker its own `&mut [T]` via
/// `split_at_mut`. Column partitions cannot: a 16-wide column chunk is
/// interleaved with every other chunk in row-major memory. Those workers
/// share one `DisjointMut` instead and borrow the 16-wide row segments they
/// own through [`DisjointMut::segment`].
pub struct DisjointMut<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: the contract of `segment` requires that no two threads borrow
// overlapping segments at the same time.
unsafe impl<T: Send> Send for DisjointMut<'_, T> {}
unsafe impl<T: Send> Sync for DisjointMut<'_, T> {}

impl<T> Clone for DisjointMut<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DisjointMut<'_, T> {}

impl<'a, T> DisjointMut<'a, T> {
    /// Wraps an exclusively borrowed output buffer.
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Number of elements in the wrapped buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the wrapped buffer is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrows `out[start..start + len]` mutably.
    ///
    /// # Panics
    ///
    /// Panics if the segment runs past the end of the buffer.
    ///
    /// # Safety
    ///
    /// While the returned slice is alive, no other thread may read or write
    /// any element of the segment.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn segment(&self, start: usize, len: usize) -> &mut [T] {
        assert!(
            start <= self.len && len <= self.len - start,
            "segment {start}..{} out of bounds for length {}",
            start + len,
            self.len
        );
        // SAFETY: in bounds (checked above), and exclusive per the caller's contract.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), len) }
    }
}

/// Checks the shape preconditions shared by every kernel entry point.
///
/// # Panics
///
/// Panics if any buffer does not hold exactly `n * n` elements.
#[inline]
pub(crate) fn assert_square<T>(a: &[T], b: &[T], c_len: usize, n: usize) {
    let len = n * n;
    assert_eq!(a.len(), len, "A: expected {n}x{n}={len} elements");
    assert_eq!(b.len(), len, "B: expected {n}x{n}={len} elements");
    assert_eq!(c_len, len, "C: expected {n}x{n}={len} elements");
}

/// Checks that `n` is a whole number of tiles.
///
/// # Panics
///
/// Panics if `n` is not a multiple of [`TILE`](crate::TILE).
#[inline]
pub(crate) fn assert_tiled(n: usize) {
    assert!(
        n % crate::TILE == 0,
        "N = {n} must be a multiple of the {}-wide tile",
        crate::TILE
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_mut_segments() {
        let mut data = vec![1.0f64; 8];
        let out = DisjointMut::new(&mut data);
        assert_eq!(out.len(), 8);
        unsafe {
            out.segment(0, 2).iter_mut().for_each(|x| *x += 2.0);
            out.segment(6, 2)[1] = -1.0;
        }
        assert_eq!(data, vec![3.0, 3.0, 1.0, 1.0, 1.0, 1.0, 1.0, -1.0]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_disjoint_mut_bounds_checked() {
        let mut data = vec![0.0f32; 4];
        let out = DisjointMut::new(&mut data);
        unsafe { out.segment(2, 3)[0] = 1.0 };
    }

    #[test]
    #[should_panic(expected = "multiple of the 16-wide tile")]
    fn test_assert_tiled() {
        assert_tiled(24);
    }
}

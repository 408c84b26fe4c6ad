//! Owned, cache-line aligned square matrix buffers.
//!
//! A [`Matrix`] is a flat row-major array of `N × N` elements: element
//! `(r, c)` lives at index `r * N + c`. The buffer is allocated with
//! [`ALIGNMENT`]-byte alignment so that every row of a tile-multiple matrix
//! starts on a cache-line boundary. Kernels never see the `Matrix` itself,
//! only borrowed `&[T]` / `&mut [T]` views of it.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut, Range};
use std::ptr::NonNull;

use rand::Rng;

use crate::element::Element;
use crate::error::{allocation_error, layout_error, validation_error, Result};
use crate::ALIGNMENT;

/// A heap-allocated `N × N` row-major matrix with 64-byte aligned storage.
///
/// The allocation lives as long as the benchmark configuration that owns it
/// and is released on drop. Freshly created matrices are zero-filled, which
/// is a valid `0.0` for both `f32` and `f64`.
pub struct Matrix<T: Element> {
    /// Pointer to the first element of the aligned allocation.
    ptr: NonNull<T>,
    /// Matrix dimension; the buffer holds `n * n` elements.
    n: usize,
    /// The layout used for allocation, kept so deallocation uses the exact same layout.
    layout: Layout,
    _marker: PhantomData<T>,
}

// SAFETY: `Matrix` uniquely owns its allocation, exactly like `Vec<T>`.
unsafe impl<T: Element> Send for Matrix<T> {}
unsafe impl<T: Element> Sync for Matrix<T> {}

impl<T: Element> Matrix<T> {
    /// Allocates a zero-filled `n × n` matrix.
    ///
    /// # Errors
    ///
    /// * [`ValidationError`](crate::GemmlyError::ValidationError) if `n == 0`.
    /// * [`LayoutError`](crate::GemmlyError::LayoutError) if `n * n` elements overflow `isize`.
    /// * [`AllocationError`](crate::GemmlyError::AllocationError) if the allocator returns null.
    pub fn zeroed(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(validation_error("matrix dimension must be positive"));
        }

        let size_bytes = n
            .checked_mul(n)
            .and_then(|len| len.checked_mul(mem::size_of::<T>()))
            .ok_or_else(|| layout_error(usize::MAX, ALIGNMENT, format!("{n}x{n} overflows")))?;

        let layout = Layout::from_size_align(size_bytes, ALIGNMENT)
            .map_err(|e| layout_error(size_bytes, ALIGNMENT, e.to_string()))?;

        // SAFETY: `layout` has a non-zero size because `n > 0`.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<T>())
            .ok_or_else(|| allocation_error(size_bytes, ALIGNMENT, "allocator returned null"))?;

        Ok(Matrix {
            ptr,
            n,
            layout,
            _marker: PhantomData,
        })
    }

    /// Builds a matrix whose element `(r, c)` is `f(r, c)`.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> T) -> Result<Self> {
        let mut matrix = Self::zeroed(n)?;
        for (idx, value) in matrix.iter_mut().enumerate() {
            *value = f(idx / n, idx % n);
        }
        Ok(matrix)
    }

    /// Fills a matrix with values drawn uniformly from `range`.
    ///
    /// The caller owns the RNG, so seeding it makes the matrix reproducible.
    pub fn random<R: Rng>(n: usize, rng: &mut R, range: Range<T>) -> Result<Self> {
        if range.start.partial_cmp(&range.end) != Some(std::cmp::Ordering::Less) {
            return Err(validation_error(format!(
                "empty value range {}..{}",
                range.start, range.end
            )));
        }
        Self::from_fn(n, |_, _| rng.random_range(range.clone()))
    }

    /// The `n × n` identity matrix.
    pub fn identity(n: usize) -> Result<Self> {
        Self::from_fn(n, |r, c| if r == c { T::one() } else { T::zero() })
    }

    /// A matrix with every element set to `value`.
    pub fn filled(n: usize, value: T) -> Result<Self> {
        Self::from_fn(n, |_, _| value)
    }

    /// Copies `data` (row-major, `n * n` elements) into an aligned matrix.
    pub fn from_slice(n: usize, data: &[T]) -> Result<Self> {
        if data.len() != n * n {
            return Err(validation_error(format!(
                "expected {} elements for a {n}x{n} matrix, got {}",
                n * n,
                data.len()
            )));
        }
        let mut matrix = Self::zeroed(n)?;
        matrix.copy_from_slice(data);
        Ok(matrix)
    }

    /// Returns `Bᵀ`: element `(r, c)` of the result is element `(c, r)` of `self`.
    ///
    /// The transposed kernels expect B in this form.
    pub fn transposed(&self) -> Result<Self> {
        let n = self.n;
        Self::from_fn(n, |r, c| self[c * n + r])
    }

    /// Resets every element to zero, making the matrix a valid accumulation target again.
    pub fn clear(&mut self) {
        self.fill(T::zero());
    }

    /// The matrix dimension `N`.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Element `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self[row * self.n + col]
    }

    /// Borrowed view of the row-major elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` points to `n * n` initialized elements owned by `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.n * self.n) }
    }

    /// Mutable view of the row-major elements.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.n * self.n) }
    }

    /// Whether the first element sits on an [`ALIGNMENT`]-byte boundary.
    pub fn is_aligned(&self) -> bool {
        (self.ptr.as_ptr() as usize) % ALIGNMENT == 0
    }
}

impl<T: Element> Drop for Matrix<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout, which is never zero-sized.
        unsafe { dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

impl<T: Element> Deref for Matrix<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Element> DerefMut for Matrix<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: Element> Clone for Matrix<T> {
    fn clone(&self) -> Self {
        let mut copy = match Self::zeroed(self.n) {
            Ok(m) => m,
            // The same layout already succeeded once for `self`.
            Err(_) => std::alloc::handle_alloc_error(self.layout),
        };
        copy.copy_from_slice(self);
        copy
    }
}

impl<T: Element> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("n", &self.n)
            .field("dtype", &T::NAME)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zeroed_is_aligned_and_zero() {
        let m = Matrix::<f64>::zeroed(48).unwrap();
        assert!(m.is_aligned());
        assert_eq!(m.len(), 48 * 48);
        assert!(m.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(
            Matrix::<f32>::zeroed(0),
            Err(crate::GemmlyError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_identity() {
        let m = Matrix::<f32>::identity(4).unwrap();
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(m.get(r, c), if r == c { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_transposed() {
        // 1 2 3
        // 4 5 6
        // 7 8 9
        let m = Matrix::from_slice(3, &[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
        let t = m.transposed().unwrap();
        assert_eq!(t.as_slice(), &[1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_random_is_seeded_and_in_range() {
        let a = Matrix::<f64>::random(16, &mut StdRng::seed_from_u64(7), -10.0..10.0).unwrap();
        let b = Matrix::<f64>::random(16, &mut StdRng::seed_from_u64(7), -10.0..10.0).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert!(a.iter().all(|&x| (-10.0..10.0).contains(&x)));
    }

    #[test]
    fn test_random_rejects_empty_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Matrix::<f32>::random(4, &mut rng, 1.0..1.0).is_err());
    }

    #[test]
    fn test_clear_and_clone() {
        let mut m = Matrix::<f32>::filled(8, 3.0).unwrap();
        let copy = m.clone();
        m.clear();
        assert!(m.iter().all(|&x| x == 0.0));
        assert!(copy.iter().all(|&x| x == 3.0));
        assert!(copy.is_aligned());
    }

    #[test]
    fn test_from_slice_length_mismatch() {
        assert!(Matrix::from_slice(2, &[1.0f64, 2.0, 3.0]).is_err());
    }
}

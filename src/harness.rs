//! Benchmark harness: input generation, timing and verification.
//!
//! A [`Workload`] owns the aligned A, B, Bᵀ and C buffers of one matrix size.
//! They are allocated once and reused across every variant and iteration;
//! only C is cleared before each call because the kernels accumulate.

use std::time::{Duration, Instant};

use log::debug;
use num::NumCast;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::element::{max_scaled_error, Element};
use crate::error::{validation_error, Result};
use crate::kernels::serial::naive;
use crate::matrix::Matrix;
use crate::parallel::Executor;
use crate::variant::Variant;

/// Input and output buffers for one matrix dimension.
#[derive(Debug, Clone)]
pub struct Workload<T: Element> {
    a: Matrix<T>,
    b: Matrix<T>,
    bt: Matrix<T>,
    c: Matrix<T>,
    expected: Option<Expected<T>>,
}

/// The naive product together with `|A| × |B|`, the magnitude of the terms
/// each element of the product was summed from.
#[derive(Debug, Clone)]
struct Expected<T: Element> {
    product: Matrix<T>,
    magnitude: Matrix<T>,
}

impl<T: Element> Expected<T> {
    fn compute(a: &Matrix<T>, b: &Matrix<T>) -> Result<Self> {
        let n = a.n();
        let mut product = Matrix::zeroed(n)?;
        naive(a.as_slice(), b.as_slice(), product.as_mut_slice(), n);

        let abs_a = Matrix::from_fn(n, |r, c| a.get(r, c).abs())?;
        let abs_b = Matrix::from_fn(n, |r, c| b.get(r, c).abs())?;
        let mut magnitude = Matrix::zeroed(n)?;
        naive(abs_a.as_slice(), abs_b.as_slice(), magnitude.as_mut_slice(), n);

        Ok(Self { product, magnitude })
    }
}

impl<T: Element> Workload<T> {
    /// Random A and B drawn uniformly from `[low, high)` with a seeded [`StdRng`].
    ///
    /// The same `(n, seed, range)` always produces the same matrices.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `n == 0` or the range is empty or not
    /// representable in `T`, or an allocation error.
    pub fn random(n: usize, seed: u64, (low, high): (f64, f64)) -> Result<Self> {
        let cast = |value: f64| -> Result<T> {
            NumCast::from(value)
                .ok_or_else(|| validation_error(format!("{value} does not fit in {}", T::NAME)))
        };
        let (low, high) = (cast(low)?, cast(high)?);

        let mut rng = StdRng::seed_from_u64(seed);
        let a = Matrix::random(n, &mut rng, low..high)?;
        let b = Matrix::random(n, &mut rng, low..high)?;
        debug!("{n}x{n} {} workload from seed {seed}", T::NAME);
        Self::from_matrices(a, b)
    }

    /// Wraps existing A and B.
    ///
    /// # Errors
    ///
    /// Returns a validation error if A and B differ in dimension.
    pub fn from_matrices(a: Matrix<T>, b: Matrix<T>) -> Result<Self> {
        if a.n() != b.n() {
            return Err(validation_error(format!(
                "A is {0}x{0} but B is {1}x{1}",
                a.n(),
                b.n()
            )));
        }
        let bt = b.transposed()?;
        let c = Matrix::zeroed(a.n())?;
        Ok(Self {
            a,
            b,
            bt,
            c,
            expected: None,
        })
    }

    pub fn n(&self) -> usize {
        self.a.n()
    }

    pub fn a(&self) -> &Matrix<T> {
        &self.a
    }

    pub fn b(&self) -> &Matrix<T> {
        &self.b
    }

    /// C as left by the last [`run`](Workload::run).
    pub fn c(&self) -> &Matrix<T> {
        &self.c
    }

    /// Clears C and runs `variant` once, passing Bᵀ to the transposed kernels.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from [`Variant::run`].
    pub fn run<E: Executor>(&mut self, variant: Variant, exec: &E) -> Result<()> {
        self.c.clear();
        self.accumulate(variant, exec)
    }

    /// Runs `variant` once without clearing C first.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from [`Variant::run`].
    pub fn accumulate<E: Executor>(&mut self, variant: Variant, exec: &E) -> Result<()> {
        let n = self.n();
        let b = if variant.uses_transposed_b() { &self.bt } else { &self.b };
        variant.run(self.a.as_slice(), b.as_slice(), self.c.as_mut_slice(), n, exec)
    }

    /// Runs `variant` on zeroed C and compares the result with the naive kernel.
    ///
    /// Each element's error is measured against `1 + Σ_k |A[i][k] · B[k][j]|`,
    /// so kernels that sum in a different order are not failed where the
    /// product cancels to near zero. The naive result is computed on first
    /// use and cached.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Variant::run`] and from allocating the
    /// expected matrix.
    pub fn verify<E: Executor>(&mut self, variant: Variant, exec: &E) -> Result<Verification> {
        let expected = match self.expected.take() {
            Some(expected) => expected,
            None => Expected::compute(&self.a, &self.b)?,
        };

        let outcome = self.run(variant, exec).map(|()| {
            let max_error = max_scaled_error(
                expected.product.as_slice(),
                self.c.as_slice(),
                expected.magnitude.as_slice(),
            );
            Verification {
                variant,
                n: self.n(),
                max_error,
                tolerance: T::RELATIVE_TOLERANCE,
            }
        });
        self.expected = Some(expected);
        outcome
    }
}

/// Outcome of [`Workload::verify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub variant: Variant,
    pub n: usize,
    /// Largest `|expected - actual| / (1 + Σ_k |a_ik · b_kj|)` over all elements.
    pub max_error: f64,
    pub tolerance: f64,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.max_error <= self.tolerance
    }
}

/// Timing summary of one variant at one size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub variant: Variant,
    pub n: usize,
    pub iterations: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl Measurement {
    /// Builds a summary from per-iteration wall-clock times.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `times` is empty.
    pub fn from_times(variant: Variant, n: usize, times: &[Duration]) -> Result<Self> {
        let (Some(&min), Some(&max)) = (times.iter().min(), times.iter().max()) else {
            return Err(validation_error("no timed iterations"));
        };
        let total: Duration = times.iter().sum();
        Ok(Self {
            variant,
            n,
            iterations: times.len(),
            mean: total / times.len() as u32,
            min,
            max,
        })
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean.as_secs_f64() * 1e3
    }

    pub fn min_ms(&self) -> f64 {
        self.min.as_secs_f64() * 1e3
    }

    pub fn max_ms(&self) -> f64 {
        self.max.as_secs_f64() * 1e3
    }

    /// Throughput of the mean iteration, counting `2 N³` flops per GEMM.
    pub fn gflops(&self) -> f64 {
        gflops(self.n, self.mean)
    }
}

/// `2 N³` floating-point operations in `elapsed`, in GFLOP/s.
pub fn gflops(n: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return f64::INFINITY;
    }
    2.0 * (n as f64).powi(3) / secs / 1e9
}

/// Runs `warmup` untimed and `iterations` timed calls of `variant`.
///
/// C is cleared before every call; the clear is not part of the timing.
///
/// # Errors
///
/// Returns a validation error if `iterations == 0` and propagates errors
/// from [`Variant::run`].
pub fn measure<T: Element, E: Executor>(
    workload: &mut Workload<T>,
    variant: Variant,
    exec: &E,
    warmup: usize,
    iterations: usize,
) -> Result<Measurement> {
    if iterations == 0 {
        return Err(validation_error("at least one timed iteration is required"));
    }

    for _ in 0..warmup {
        workload.run(variant, exec)?;
    }

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        workload.c.clear();
        let start = Instant::now();
        workload.accumulate(variant, exec)?;
        times.push(start.elapsed());
    }

    let measurement = Measurement::from_times(variant, workload.n(), &times)?;
    debug!(
        "{variant} n={} mean {:.3} ms over {iterations} iterations",
        measurement.n,
        measurement.mean_ms()
    );
    Ok(measurement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ScopedExecutor;

    #[test]
    fn test_random_workload_is_reproducible() {
        let w1 = Workload::<f64>::random(16, 7, (-1.0, 1.0)).unwrap();
        let w2 = Workload::<f64>::random(16, 7, (-1.0, 1.0)).unwrap();
        assert_eq!(w1.a().as_slice(), w2.a().as_slice());
        assert_eq!(w1.b().as_slice(), w2.b().as_slice());
        assert_ne!(w1.a().as_slice(), w1.b().as_slice());
        assert!(w1.a().iter().all(|&x| (-1.0..1.0).contains(&x)));
    }

    #[test]
    fn test_run_clears_c_between_calls() {
        let a = Matrix::<f32>::filled(16, 1.0).unwrap();
        let b = Matrix::<f32>::filled(16, 1.0).unwrap();
        let mut w = Workload::from_matrices(a, b).unwrap();
        let exec = ScopedExecutor::new(2).unwrap();

        w.run(Variant::Blocked, &exec).unwrap();
        w.run(Variant::Blocked, &exec).unwrap();
        assert!(w.c().iter().all(|&x| x == 16.0));

        w.accumulate(Variant::Blocked, &exec).unwrap();
        assert!(w.c().iter().all(|&x| x == 32.0));
    }

    #[test]
    fn test_verify_passes_for_transposed() {
        let mut w = Workload::<f64>::random(32, 3, (-10.0, 10.0)).unwrap();
        let exec = ScopedExecutor::new(1).unwrap();
        for variant in [Variant::Transposed, Variant::TransposedLanes, Variant::Reference] {
            let v = w.verify(variant, &exec).unwrap();
            assert!(v.passed(), "{variant}: error {}", v.max_error);
        }
    }

    #[test]
    fn test_expected_magnitude_ignores_cancellation() {
        let a = Matrix::from_slice(2, &[1.0f64, -1.0, 2.0, 3.0]).unwrap();
        let b = Matrix::from_slice(2, &[1.0f64, 2.0, 1.0, -4.0]).unwrap();
        let expected = Expected::compute(&a, &b).unwrap();
        assert_eq!(expected.product.as_slice(), &[0.0, 6.0, 5.0, -8.0]);
        assert_eq!(expected.magnitude.as_slice(), &[2.0, 6.0, 5.0, 16.0]);
    }

    #[test]
    fn test_f32_reordered_sums_pass_at_default_range() {
        let range = crate::BenchConfig::default().value_range;
        let mut w = Workload::<f32>::random(128, 42, range).unwrap();
        let exec = ScopedExecutor::new(2).unwrap();
        for variant in [Variant::TransposedLanes, Variant::Reference, Variant::ForwardBackward] {
            let v = w.verify(variant, &exec).unwrap();
            assert!(v.passed(), "{variant}: error {:.3e}", v.max_error);
        }
    }

    #[test]
    fn test_mismatched_dimensions() {
        let a = Matrix::<f64>::zeroed(16).unwrap();
        let b = Matrix::<f64>::zeroed(32).unwrap();
        assert!(Workload::from_matrices(a, b).is_err());
    }

    #[test]
    fn test_measure_counts_iterations() {
        let mut w = Workload::<f64>::random(16, 1, (-1.0, 1.0)).unwrap();
        let exec = ScopedExecutor::new(1).unwrap();
        let m = measure(&mut w, Variant::Naive, &exec, 1, 3).unwrap();
        assert_eq!(m.iterations, 3);
        assert!(m.min <= m.mean && m.mean <= m.max);
        assert!(measure(&mut w, Variant::Naive, &exec, 0, 0).is_err());
    }

    #[test]
    fn test_measurement_statistics() {
        let times = [
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
        ];
        let m = Measurement::from_times(Variant::Blocked, 1000, &times).unwrap();
        assert_eq!(m.mean, Duration::from_millis(20));
        assert_eq!(m.min_ms(), 10.0);
        assert_eq!(m.max_ms(), 30.0);
        // 2e9 flops in 20 ms
        assert!((m.gflops() - 100.0).abs() < 1e-9);
        assert!(Measurement::from_times(Variant::Blocked, 16, &[]).is_err());
    }
}

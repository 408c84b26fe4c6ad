//! # gemmly
//!
//! Dense square matrix multiplication (`C += A × B`) written several ways,
//! so the effect of loop order, cache blocking, work partitioning and thread
//! management on throughput can be measured side by side.
//!
//! ## Kernels
//!
//! - [`kernels::serial`]: naive and transposed triple loops.
//! - [`kernels::blocked`]: row-blocked 16×16 tiling.
//! - [`kernels::column`]: column-chunk-outermost tilings, including the
//!   multi-output and forward/backward sweeps.
//! - [`parallel`]: the blocked kernels distributed over worker threads with
//!   static, strided or atomic work-stealing partitions ([`partition`]).
//! - [`reference`]: `ndarray`'s GEMM as the vendor baseline.
//!
//! All kernels operate on flat row-major `&[T]` buffers of `N × N` elements
//! with `T` one of `f32`/`f64` ([`Element`]), and accumulate into C. The
//! blocked kernels need `N` to be a multiple of [`TILE`].
//!
//! ## Harness
//!
//! [`Variant`] names every kernel and offers a checked entry point that
//! reports bad shapes as [`GemmlyError`] instead of panicking.
//! [`Workload`] owns aligned [`Matrix`] buffers for one size, and
//! [`measure`] / [`Workload::verify`] time and check a variant.
//!
//! ```
//! use gemmly::{ScopedExecutor, Variant, Workload};
//!
//! let mut workload = Workload::<f64>::random(64, 42, (-1.0, 1.0))?;
//! let exec = ScopedExecutor::new(4)?;
//! let check = workload.verify(Variant::ParallelMultiOutputAtomic, &exec)?;
//! assert!(check.passed());
//! # Ok::<(), gemmly::GemmlyError>(())
//! ```
//!
//! The library logs through the [`log`] facade and never installs a logger.

pub mod config;
pub mod element;
pub mod error;
pub mod harness;
pub mod kernels;
pub mod matrix;
pub mod parallel;
pub mod partition;
pub mod reference;
pub mod variant;

/// Edge length of a square tile, and width of a column chunk.
pub const TILE: usize = 16;

/// Byte alignment of [`Matrix`] storage: one cache line.
pub const ALIGNMENT: usize = 64;

pub use config::{BenchConfig, ExecutorKind};
pub use element::Element;
pub use error::{GemmlyError, Result};
pub use harness::{measure, Measurement, Verification, Workload};
pub use matrix::Matrix;
pub use parallel::{Executor, PooledExecutor, ScopedExecutor};
pub use partition::ChunkCursor;
pub use variant::Variant;

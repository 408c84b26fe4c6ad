//! Thread-parallel GEMM.
//!
//! Each parallel kernel pairs a single-threaded loop nest with a partitioning
//! discipline from [`partition`](crate::partition) and runs one task per
//! worker on an [`Executor`]. Workers share A and B read-only and write
//! disjoint regions of C, so nothing is merged after the join:
//!
//! - row-partitioned kernels split C with `split_at_mut`, every worker owns a
//!   plain `&mut [T]` row slab;
//! - column-partitioned kernels share a [`DisjointMut`] handle and only touch
//!   the 16-wide column chunks assigned to (or claimed by) them.
//!
//! Two executors are provided. [`ScopedExecutor`] spawns and joins fresh OS
//! threads on every call, so thread launch cost is part of what gets timed.
//! [`PooledExecutor`] keeps a rayon pool alive across calls.

use std::ops::Range;
use std::thread;

use log::{debug, trace};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::element::Element;
use crate::error::{thread_pool_error, validation_error, Result};
use crate::kernels::blocked::blocked_rows;
use crate::kernels::column::ColumnSweep;
use crate::kernels::serial::naive_rows;
use crate::kernels::{assert_square, assert_tiled, DisjointMut};
use crate::partition::{split_column_chunks, split_rows, ChunkCursor, StridedChunks};
use crate::TILE;

/// Runs one task per work item concurrently and returns once all are done.
///
/// Returning from [`run_each`](Executor::run_each) is the only
/// synchronization point: every write a task made is visible to the caller
/// afterwards. A panicking task propagates its panic to the caller.
pub trait Executor {
    /// Number of workers tasks are distributed over.
    fn workers(&self) -> usize;

    /// Runs `task(item)` for every item, concurrently, and joins.
    fn run_each<I, F>(&self, items: Vec<I>, task: F)
    where
        I: Send,
        F: Fn(I) + Sync;
}

/// Number of hardware threads, or 1 if it cannot be determined.
pub fn available_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Spawns fresh OS threads for every call and joins them before returning.
///
/// The calling thread runs the last item itself, so `k` items cost `k - 1`
/// spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedExecutor {
    workers: usize,
}

impl ScopedExecutor {
    /// An executor with `workers` workers.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `workers == 0`.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(validation_error("worker count must be positive"));
        }
        debug!("scoped executor with {workers} workers");
        Ok(Self { workers })
    }

    /// An executor sized to the detected hardware concurrency.
    pub fn detected() -> Self {
        Self {
            workers: available_workers(),
        }
    }
}

impl Executor for ScopedExecutor {
    fn workers(&self) -> usize {
        self.workers
    }

    fn run_each<I, F>(&self, items: Vec<I>, task: F)
    where
        I: Send,
        F: Fn(I) + Sync,
    {
        let task = &task;
        thread::scope(|s| {
            let mut items = items.into_iter();
            let last = items.next_back();
            for item in items {
                s.spawn(move || task(item));
            }
            if let Some(item) = last {
                task(item);
            }
        });
    }
}

/// A persistent rayon thread pool reused across calls.
///
/// Building the pool is paid once per benchmark configuration; every call
/// then only pays for task submission and the final join.
pub struct PooledExecutor {
    pool: ThreadPool,
}

impl PooledExecutor {
    /// Builds a pool of `workers` threads.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `workers == 0`, or a thread pool error
    /// if the OS refuses to start the threads.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(validation_error("worker count must be positive"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gemmly-worker-{i}"))
            .build()
            .map_err(|e| thread_pool_error(workers, e.to_string()))?;
        debug!("pooled executor with {workers} workers");
        Ok(Self { pool })
    }
}

impl std::fmt::Debug for PooledExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledExecutor")
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl Executor for PooledExecutor {
    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run_each<I, F>(&self, items: Vec<I>, task: F)
    where
        I: Send,
        F: Fn(I) + Sync,
    {
        let task = &task;
        self.pool.scope(|s| {
            for item in items {
                s.spawn(move |_| task(item));
            }
        });
    }
}

// --- Row-partitioned kernels ---

/// Splits C into the row slabs described by `ranges` (which must tile `0..n`).
fn row_slabs<'c, T>(
    c: &'c mut [T],
    n: usize,
    ranges: &[Range<usize>],
) -> Vec<(usize, &'c mut [T])> {
    let mut slabs = Vec::with_capacity(ranges.len());
    let mut rest = c;
    for range in ranges {
        let (slab, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * n);
        slabs.push((range.start, slab));
        rest = tail;
    }
    slabs
}

/// Naive kernel over static row ranges, one range per worker.
///
/// Works for any `n`.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n`.
pub fn parallel_naive<T: Element, E: Executor>(a: &[T], b: &[T], c: &mut [T], n: usize, exec: &E) {
    assert_square(a, b, c.len(), n);
    let ranges = split_rows(n, exec.workers());
    exec.run_each(row_slabs(c, n, &ranges), |(start_row, slab)| {
        naive_rows(a, b, slab, n, start_row);
    });
}

/// Row-blocked kernel over static row ranges, one range per worker.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n` or `n` is not a multiple of [`TILE`].
pub fn parallel_blocked<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    assert_square(a, b, c.len(), n);
    assert_tiled(n);
    let ranges = split_rows(n, exec.workers());
    exec.run_each(row_slabs(c, n, &ranges), |(start_row, slab)| {
        blocked_rows(a, b, slab, n, start_row);
    });
}

// --- Column-partitioned kernels ---

/// Column-chunk kernel over static contiguous column ranges.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n` or `n` is not a multiple of [`TILE`].
pub fn parallel_columns_static<T: Element, E: Executor>(
    sweep: ColumnSweep,
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    assert_square(a, b, c.len(), n);
    assert_tiled(n);
    let out = DisjointMut::new(c);
    let ranges = split_column_chunks(n, exec.workers());
    exec.run_each(ranges, |cols| {
        // SAFETY: the static ranges are disjoint and tile aligned.
        unsafe { sweep.run_chunks(a, b, out, n, cols.step_by(TILE)) };
    });
}

/// Column-chunk kernel where worker `w` of `W` owns chunks `w*16, w*16 + W*16, ...`.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n` or `n` is not a multiple of [`TILE`].
pub fn parallel_columns_strided<T: Element, E: Executor>(
    sweep: ColumnSweep,
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    assert_square(a, b, c.len(), n);
    assert_tiled(n);
    let out = DisjointMut::new(c);
    let workers = exec.workers();
    exec.run_each((0..workers).collect(), |worker: usize| {
        // SAFETY: different workers' strided sequences never share a chunk.
        unsafe { sweep.run_chunks(a, b, out, n, StridedChunks::new(n, worker, workers)) };
    });
}

/// Column-chunk kernel with dynamic work-stealing from `cursor`.
///
/// Every worker claims chunks until the cursor runs past `n`. The cursor is
/// passed in so callers can inspect [`ChunkCursor::claimed`] afterwards; it
/// must be fresh (positioned at 0) for C to be fully computed.
///
/// # Panics
///
/// Panics if the slice sizes don't match `n * n`, `n` is not a multiple of
/// [`TILE`], or the cursor was created for a different `n`.
pub fn parallel_columns_atomic<T: Element, E: Executor>(
    sweep: ColumnSweep,
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    cursor: &ChunkCursor,
    exec: &E,
) {
    assert_square(a, b, c.len(), n);
    assert_tiled(n);
    assert_eq!(cursor.n(), n, "cursor was created for N = {}", cursor.n());
    let out = DisjointMut::new(c);
    exec.run_each((0..exec.workers()).collect(), |worker: usize| {
        // SAFETY: the cursor hands every chunk to exactly one claimant.
        let done = unsafe { sweep.run_chunks(a, b, out, n, cursor.claims()) };
        trace!("worker {worker} computed {done} column chunks");
    });
}

/// Column-blocked kernel over static column ranges.
pub fn parallel_blocked_column<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    parallel_columns_static(ColumnSweep::Rows, a, b, c, n, exec);
}

/// Column-blocked kernel with atomic work-stealing.
pub fn parallel_blocked_column_atomic<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    parallel_columns_atomic(ColumnSweep::Rows, a, b, c, n, &ChunkCursor::new(n), exec);
}

/// Multi-output kernel over strided column chunks.
pub fn parallel_multi_output<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    parallel_columns_strided(ColumnSweep::MultiOutput, a, b, c, n, exec);
}

/// Multi-output kernel with atomic work-stealing.
pub fn parallel_multi_output_atomic<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    parallel_columns_atomic(ColumnSweep::MultiOutput, a, b, c, n, &ChunkCursor::new(n), exec);
}

/// Forward/backward kernel with atomic work-stealing.
pub fn parallel_forward_backward_atomic<T: Element, E: Executor>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    n: usize,
    exec: &E,
) {
    parallel_columns_atomic(ColumnSweep::ForwardBackward, a, b, c, n, &ChunkCursor::new(n), exec);
}

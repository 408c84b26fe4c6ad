//! Work partitioning for the parallel kernels.
//!
//! Two disciplines hand out disjoint pieces of the output:
//!
//! - **Static**: the partitioned dimension is split up front into one range
//!   per worker ([`split_rows`], [`split_column_chunks`]) or into a fixed
//!   stride ([`StridedChunks`]). Load distribution is fixed regardless of
//!   runtime skew.
//! - **Dynamic**: workers pull 16-wide column chunks from a shared
//!   [`ChunkCursor`] with an atomic fetch-and-add until it runs past `N`.
//!
//! Uneven division is handled the same way everywhere: the last worker
//! absorbs the remainder and no range ever extends past `N`.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, warn};

use crate::TILE;

/// Splits rows `0..n` into `workers` contiguous ranges.
///
/// Worker `i` gets `[i * n / workers, (i + 1) * n / workers)` computed with
/// `rows_per_worker = n / workers`; the last worker's end is extended to `n`.
/// With more workers than rows, the leading workers receive empty ranges.
///
/// # Panics
///
/// Panics if `workers == 0`.
pub fn split_rows(n: usize, workers: usize) -> Vec<Range<usize>> {
    let ranges = split_units(n, workers, 1);
    debug!("split {n} rows across {workers} workers: {ranges:?}");
    ranges
}

/// Splits the columns `0..n` into `workers` contiguous ranges of whole
/// 16-wide chunks.
///
/// Range bounds are column offsets and multiples of [`TILE`] (except the
/// final end, which is `n`). The last worker absorbs the leftover chunks.
///
/// # Panics
///
/// Panics if `workers == 0`.
pub fn split_column_chunks(n: usize, workers: usize) -> Vec<Range<usize>> {
    let ranges = split_units(n, workers, TILE);
    debug!("split {n} columns into {TILE}-wide chunks across {workers} workers: {ranges:?}");
    ranges
}

fn split_units(n: usize, workers: usize, unit: usize) -> Vec<Range<usize>> {
    assert!(workers > 0, "at least one worker is required");

    let units = n.div_ceil(unit);
    let idle = idle_workers(units, workers);
    if idle > 0 {
        warn!("{workers} workers for {units} units of work: {idle} workers stay idle");
    }

    let per_worker = units / workers;
    (0..workers)
        .map(|i| {
            let start = (i * per_worker * unit).min(n);
            let end = if i + 1 == workers {
                n
            } else {
                ((i + 1) * per_worker * unit).min(n)
            };
            start..end
        })
        .collect()
}

/// Number of workers left without work when `units` indivisible pieces
/// (rows, or 16-wide column chunks) are spread over `workers`.
pub fn idle_workers(units: usize, workers: usize) -> usize {
    workers.saturating_sub(units)
}

/// Column chunks owned by one worker under strided static partitioning:
/// `worker * 16, worker * 16 + workers * 16, ...` while below `n`.
#[derive(Debug, Clone)]
pub struct StridedChunks {
    next: usize,
    stride: usize,
    n: usize,
}

impl StridedChunks {
    /// Chunks of worker `worker` out of `workers`.
    ///
    /// # Panics
    ///
    /// Panics if `workers == 0` or `worker >= workers`.
    pub fn new(n: usize, worker: usize, workers: usize) -> Self {
        assert!(worker < workers, "worker {worker} out of range for {workers} workers");
        Self {
            next: worker * TILE,
            stride: workers * TILE,
            n,
        }
    }
}

impl Iterator for StridedChunks {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.n {
            return None;
        }
        let chunk = self.next;
        self.next += self.stride;
        Some(chunk)
    }
}

/// Shared cursor dispensing 16-wide column chunks on demand.
///
/// Every [`claim`](ChunkCursor::claim) performs one `fetch_add(16)`, so each
/// chunk offset below `n` is returned to exactly one caller no matter how
/// many threads race on the cursor. Which worker gets which chunk is
/// unspecified. The cursor also counts successful claims.
#[derive(Debug)]
pub struct ChunkCursor {
    pos: AtomicUsize,
    claimed: AtomicUsize,
    n: usize,
}

impl ChunkCursor {
    /// A cursor over the columns `0..n`, starting at offset 0.
    pub fn new(n: usize) -> Self {
        Self {
            pos: AtomicUsize::new(0),
            claimed: AtomicUsize::new(0),
            n,
        }
    }

    /// Claims the next chunk, or returns `None` once the cursor has passed `n`.
    #[inline]
    pub fn claim(&self) -> Option<usize> {
        // Uniqueness comes from the atomicity of the RMW; the data itself is
        // published by the join at the end of the parallel region.
        let offset = self.pos.fetch_add(TILE, Ordering::Relaxed);
        if offset < self.n {
            self.claimed.fetch_add(1, Ordering::Relaxed);
            Some(offset)
        } else {
            None
        }
    }

    /// Iterator that keeps claiming until the cursor is exhausted.
    pub fn claims(&self) -> Claims<'_> {
        Claims { cursor: self }
    }

    /// Number of successful claims so far.
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Relaxed)
    }

    /// Number of chunks the cursor dispenses in total.
    pub fn total_chunks(&self) -> usize {
        self.n.div_ceil(TILE)
    }

    /// The column count the cursor was created for.
    pub fn n(&self) -> usize {
        self.n
    }
}

/// Iterator returned by [`ChunkCursor::claims`].
#[derive(Debug)]
pub struct Claims<'a> {
    cursor: &'a ChunkCursor,
}

impl Iterator for Claims<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        self.cursor.claim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Asserts that `ranges` tile `0..n` in order with no gap and no overlap.
    fn assert_exact_cover(ranges: &[Range<usize>], n: usize) {
        let mut expected_start = 0;
        for r in ranges {
            assert_eq!(r.start, expected_start, "gap or overlap at {r:?} in {ranges:?}");
            assert!(r.start <= r.end, "inverted range {r:?}");
            expected_start = r.end;
        }
        assert_eq!(expected_start, n, "ranges {ranges:?} do not end at {n}");
    }

    #[test]
    fn test_split_rows_even() {
        assert_eq!(split_rows(256, 4), vec![0..64, 64..128, 128..192, 192..256]);
    }

    #[test]
    fn test_split_rows_remainder_goes_to_last() {
        let ranges = split_rows(10, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_split_rows_more_workers_than_rows() {
        let ranges = split_rows(3, 5);
        assert_exact_cover(&ranges, 3);
        assert_eq!(ranges[4], 0..3);
    }

    #[test]
    fn test_static_partitions_cover_exactly() {
        for workers in [1, 2, 4, 8] {
            assert_exact_cover(&split_rows(256, workers), 256);
            let cols = split_column_chunks(256, workers);
            assert_exact_cover(&cols, 256);
            assert!(cols.iter().all(|r| r.start % TILE == 0));
        }
    }

    #[test]
    fn test_split_column_chunks_uneven() {
        // 5 chunks across 2 workers: 2 chunks, then 3.
        assert_eq!(split_column_chunks(80, 2), vec![0..32, 32..80]);
    }

    #[test]
    fn test_idle_workers() {
        // N = 32 has 2 column chunks
        assert_eq!(idle_workers(32usize.div_ceil(TILE), 64), 62);
        assert_eq!(idle_workers(32, 64), 32);
        assert_eq!(idle_workers(256, 8), 0);
    }

    #[test]
    fn test_strided_chunks() {
        let chunks: Vec<_> = StridedChunks::new(128, 1, 3).collect();
        assert_eq!(chunks, vec![16, 64, 112]);

        let mut all: Vec<usize> = (0..3).flat_map(|w| StridedChunks::new(128, w, 3)).collect();
        all.sort_unstable();
        assert_eq!(all, (0..128).step_by(TILE).collect::<Vec<_>>());
    }

    #[test]
    fn test_cursor_single_thread() {
        let cursor = ChunkCursor::new(64);
        let claimed: Vec<_> = cursor.claims().collect();
        assert_eq!(claimed, vec![0, 16, 32, 48]);
        assert_eq!(cursor.claimed(), 4);
        assert_eq!(cursor.total_chunks(), 4);
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claimed(), 4);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers() {
        split_rows(16, 0);
    }
}

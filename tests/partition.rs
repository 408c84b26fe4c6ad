use std::ops::Range;
use std::thread;

use gemmly::kernels::column::ColumnSweep;
use gemmly::parallel::parallel_columns_atomic;
use gemmly::partition::{split_column_chunks, split_rows, StridedChunks};
use gemmly::{ChunkCursor, Matrix, PooledExecutor, ScopedExecutor, TILE};

const N: usize = 256;

/// Marks every index of `ranges` in a coverage table and checks each is hit once.
fn assert_covered_once(ranges: &[Range<usize>], n: usize) {
    let mut hits = vec![0u32; n];
    for r in ranges {
        assert!(r.end <= n, "range {r:?} runs past {n}");
        for i in r.clone() {
            hits[i] += 1;
        }
    }
    for (i, &h) in hits.iter().enumerate() {
        assert_eq!(h, 1, "index {i} covered {h} times by {ranges:?}");
    }
}

#[test]
fn test_static_partitions_cover_without_overlap() {
    for workers in [1, 2, 4, 8] {
        let rows = split_rows(N, workers);
        assert_eq!(rows.len(), workers);
        assert_covered_once(&rows, N);

        let cols = split_column_chunks(N, workers);
        assert_eq!(cols.len(), workers);
        assert_covered_once(&cols, N);
    }
}

#[test]
fn test_uneven_partitions_never_drop_or_overrun() {
    for n in [16, 48, 80, 100, 250] {
        for workers in 1..=12 {
            assert_covered_once(&split_rows(n, workers), n);
        }
    }
    for n in [16, 48, 80, 208] {
        for workers in 1..=12 {
            let cols = split_column_chunks(n, workers);
            assert_covered_once(&cols, n);
            assert!(cols.iter().all(|r| r.start % TILE == 0));
        }
    }
}

#[test]
fn test_strided_chunks_cover_without_overlap() {
    for workers in [1, 2, 3, 4, 8, 20] {
        let ranges: Vec<Range<usize>> = (0..workers)
            .flat_map(|w| StridedChunks::new(N, w, workers))
            .map(|chunk| chunk..chunk + TILE)
            .collect();
        assert_covered_once(&ranges, N);
    }
}

#[test]
fn test_cursor_claims_every_chunk_once_under_contention() {
    for threads in 1..=16 {
        let cursor = ChunkCursor::new(N);
        let per_thread: Vec<Vec<usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| s.spawn(|| cursor.claims().collect::<Vec<_>>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ranges: Vec<Range<usize>> = per_thread
            .iter()
            .flatten()
            .map(|&chunk| chunk..chunk + TILE)
            .collect();
        assert_covered_once(&ranges, N);
        assert_eq!(cursor.claimed(), N / TILE, "{threads} threads");
        assert_eq!(cursor.claimed(), cursor.total_chunks());
        println!(
            "{threads:>2} threads: claims per thread {:?}",
            per_thread.iter().map(Vec::len).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_instrumented_atomic_kernel_claims_all_chunks() {
    let a = Matrix::<f64>::filled(N, 1.0).unwrap();
    let b = Matrix::<f64>::filled(N, 2.0).unwrap();

    for threads in [1, 3, 8, 16] {
        let mut c = Matrix::<f64>::zeroed(N).unwrap();
        let cursor = ChunkCursor::new(N);
        let exec = ScopedExecutor::new(threads).unwrap();
        parallel_columns_atomic(
            ColumnSweep::MultiOutput,
            a.as_slice(),
            b.as_slice(),
            c.as_mut_slice(),
            N,
            &cursor,
            &exec,
        );
        assert_eq!(cursor.claimed(), N / TILE);
        assert!(c.iter().all(|&x| x == 2.0 * N as f64));

        let mut c = Matrix::<f64>::zeroed(N).unwrap();
        let cursor = ChunkCursor::new(N);
        let exec = PooledExecutor::new(threads).unwrap();
        parallel_columns_atomic(
            ColumnSweep::ForwardBackward,
            a.as_slice(),
            b.as_slice(),
            c.as_mut_slice(),
            N,
            &cursor,
            &exec,
        );
        assert_eq!(cursor.claimed(), N / TILE);
        assert!(c.iter().all(|&x| x == 2.0 * N as f64));
    }
}

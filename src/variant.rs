//! Named kernel variants and checked dispatch.
//!
//! [`Variant`] is the single list of every kernel the crate can benchmark.
//! The harness, the binary and the benches all select kernels through it.

use std::fmt;
use std::str::FromStr;

use crate::element::Element;
use crate::error::{validation_error, GemmlyError, Result};
use crate::kernels::{blocked, column, serial};
use crate::parallel::{self, Executor};
use crate::reference::reference_gemm;
use crate::TILE;

/// Lane width of the [`Variant::TransposedLanes`] dot product.
pub const DOT_LANES: usize = 4;

/// One GEMM kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Naive,
    Transposed,
    TransposedLanes,
    Blocked,
    BlockedColumn,
    PartialColumn,
    MultiOutput,
    ForwardBackward,
    ParallelNaive,
    ParallelBlocked,
    ParallelBlockedColumn,
    ParallelBlockedColumnAtomic,
    ParallelMultiOutput,
    ParallelMultiOutputAtomic,
    ParallelForwardBackwardAtomic,
    /// `ndarray`'s GEMM. Overwrites C instead of accumulating.
    Reference,
}

impl Variant {
    /// Every variant, serial ones first.
    pub const ALL: [Variant; 16] = [
        Variant::Naive,
        Variant::Transposed,
        Variant::TransposedLanes,
        Variant::Blocked,
        Variant::BlockedColumn,
        Variant::PartialColumn,
        Variant::MultiOutput,
        Variant::ForwardBackward,
        Variant::ParallelNaive,
        Variant::ParallelBlocked,
        Variant::ParallelBlockedColumn,
        Variant::ParallelBlockedColumnAtomic,
        Variant::ParallelMultiOutput,
        Variant::ParallelMultiOutputAtomic,
        Variant::ParallelForwardBackwardAtomic,
        Variant::Reference,
    ];

    /// Stable name used on the command line and in reports.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Naive => "naive",
            Variant::Transposed => "transposed",
            Variant::TransposedLanes => "transposed_lanes",
            Variant::Blocked => "blocked",
            Variant::BlockedColumn => "blocked_column",
            Variant::PartialColumn => "partial_column",
            Variant::MultiOutput => "multi_output",
            Variant::ForwardBackward => "forward_backward",
            Variant::ParallelNaive => "par_naive",
            Variant::ParallelBlocked => "par_blocked",
            Variant::ParallelBlockedColumn => "par_blocked_column",
            Variant::ParallelBlockedColumnAtomic => "par_blocked_column_atomic",
            Variant::ParallelMultiOutput => "par_multi_output",
            Variant::ParallelMultiOutputAtomic => "par_multi_output_atomic",
            Variant::ParallelForwardBackwardAtomic => "par_forward_backward_atomic",
            Variant::Reference => "reference",
        }
    }

    /// Whether the variant runs on an [`Executor`].
    pub fn is_parallel(self) -> bool {
        matches!(
            self,
            Variant::ParallelNaive
                | Variant::ParallelBlocked
                | Variant::ParallelBlockedColumn
                | Variant::ParallelBlockedColumnAtomic
                | Variant::ParallelMultiOutput
                | Variant::ParallelMultiOutputAtomic
                | Variant::ParallelForwardBackwardAtomic
        )
    }

    /// Whether `n` must be a multiple of [`TILE`].
    pub fn requires_tiles(self) -> bool {
        !matches!(
            self,
            Variant::Naive
                | Variant::Transposed
                | Variant::TransposedLanes
                | Variant::ParallelNaive
                | Variant::Reference
        )
    }

    /// Whether the variant expects Bᵀ in place of B.
    pub fn uses_transposed_b(self) -> bool {
        matches!(self, Variant::Transposed | Variant::TransposedLanes)
    }

    /// Whether the variant overwrites C rather than accumulating into it.
    pub fn overwrites(self) -> bool {
        self == Variant::Reference
    }

    /// Runs the variant on row-major `n × n` buffers.
    ///
    /// For variants where [`uses_transposed_b`](Variant::uses_transposed_b)
    /// is true, `b` must hold Bᵀ. Serial variants ignore `exec`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `n == 0`, a buffer does not hold
    /// `n * n` elements, or the variant needs tile multiples and `n` isn't one.
    pub fn run<T: Element, E: Executor>(
        self,
        a: &[T],
        b: &[T],
        c: &mut [T],
        n: usize,
        exec: &E,
    ) -> Result<()> {
        self.check(a.len(), b.len(), c.len(), n)?;
        match self {
            Variant::Naive => serial::naive(a, b, c, n),
            Variant::Transposed => serial::transposed(a, b, c, n),
            Variant::TransposedLanes => serial::transposed_lanes::<T, DOT_LANES>(a, b, c, n),
            Variant::Blocked => blocked::blocked(a, b, c, n),
            Variant::BlockedColumn => column::blocked_column(a, b, c, n),
            Variant::PartialColumn => column::partial_column(a, b, c, n),
            Variant::MultiOutput => column::multi_output(a, b, c, n),
            Variant::ForwardBackward => column::forward_backward(a, b, c, n),
            Variant::ParallelNaive => parallel::parallel_naive(a, b, c, n, exec),
            Variant::ParallelBlocked => parallel::parallel_blocked(a, b, c, n, exec),
            Variant::ParallelBlockedColumn => parallel::parallel_blocked_column(a, b, c, n, exec),
            Variant::ParallelBlockedColumnAtomic => {
                parallel::parallel_blocked_column_atomic(a, b, c, n, exec)
            }
            Variant::ParallelMultiOutput => parallel::parallel_multi_output(a, b, c, n, exec),
            Variant::ParallelMultiOutputAtomic => {
                parallel::parallel_multi_output_atomic(a, b, c, n, exec)
            }
            Variant::ParallelForwardBackwardAtomic => {
                parallel::parallel_forward_backward_atomic(a, b, c, n, exec)
            }
            Variant::Reference => reference_gemm(a, b, c, n)?,
        }
        Ok(())
    }

    /// Validates the shape of a call without running it.
    ///
    /// # Errors
    ///
    /// See [`run`](Variant::run).
    pub fn check(self, a_len: usize, b_len: usize, c_len: usize, n: usize) -> Result<()> {
        if n == 0 {
            return Err(validation_error("matrix dimension must be positive"));
        }
        let len = n
            .checked_mul(n)
            .ok_or_else(|| validation_error(format!("{n}x{n} overflows")))?;
        for (name, actual) in [("A", a_len), ("B", b_len), ("C", c_len)] {
            if actual != len {
                return Err(validation_error(format!(
                    "{}: {name} holds {actual} elements, expected {n}x{n}={len}",
                    self.name()
                )));
            }
        }
        if self.requires_tiles() && n % TILE != 0 {
            return Err(validation_error(format!(
                "{}: N = {n} is not a multiple of the {TILE}-wide tile",
                self.name()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = GemmlyError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| validation_error(format!("unknown variant '{s}'")))
    }
}

/// Parses a comma-separated variant list; `all` selects [`Variant::ALL`].
///
/// # Errors
///
/// Returns a validation error for an unknown name or an empty list.
pub fn parse_variants(list: &str) -> Result<Vec<Variant>> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(Variant::ALL.to_vec());
    }
    let variants = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Variant>>>()?;
    if variants.is_empty() {
        return Err(validation_error("no variant selected"));
    }
    Ok(variants)
}

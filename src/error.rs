//! Error types for gemmly.
//!
//! Kernels don't return errors; a bad shape handed straight to a kernel is a
//! panic. [`GemmlyError`] covers what the outer layers can report instead:
//! matrix buffer allocation, the checked [`Variant::run`](crate::variant::Variant::run)
//! entry point, configuration parsing and building the worker pool.

use std::fmt;

/// Failure outside the compute kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GemmlyError {
    /// The allocator could not provide a matrix buffer.
    AllocationError {
        /// Buffer size in bytes.
        bytes: usize,
        /// Buffer alignment in bytes.
        align: usize,
        message: String,
    },
    /// A matrix buffer size or alignment has no valid `Layout`.
    LayoutError {
        bytes: usize,
        align: usize,
        message: String,
    },
    /// Rejected input: a matrix dimension, buffer length, variant name or
    /// configuration value.
    ValidationError { message: String },
    /// The persistent worker pool could not be started.
    ThreadPoolError {
        /// Requested worker count.
        threads: usize,
        message: String,
    },
}

impl fmt::Display for GemmlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GemmlyError::AllocationError {
                bytes,
                align,
                message,
            } => write!(
                f,
                "cannot allocate matrix buffer of {bytes} bytes (align {align}): {message}"
            ),
            GemmlyError::LayoutError {
                bytes,
                align,
                message,
            } => write!(f, "no layout for {bytes} bytes aligned to {align}: {message}"),
            GemmlyError::ValidationError { message } => write!(f, "invalid input: {message}"),
            GemmlyError::ThreadPoolError { threads, message } => {
                write!(f, "cannot start a pool of {threads} workers: {message}")
            }
        }
    }
}

impl std::error::Error for GemmlyError {}

/// `Result` with [`GemmlyError`].
pub type Result<T> = std::result::Result<T, GemmlyError>;

pub fn allocation_error(bytes: usize, align: usize, message: impl Into<String>) -> GemmlyError {
    GemmlyError::AllocationError {
        bytes,
        align,
        message: message.into(),
    }
}

pub fn layout_error(bytes: usize, align: usize, message: impl Into<String>) -> GemmlyError {
    GemmlyError::LayoutError {
        bytes,
        align,
        message: message.into(),
    }
}

pub fn validation_error(message: impl Into<String>) -> GemmlyError {
    GemmlyError::ValidationError {
        message: message.into(),
    }
}

pub fn thread_pool_error(threads: usize, message: impl Into<String>) -> GemmlyError {
    GemmlyError::ThreadPoolError {
        threads,
        message: message.into(),
    }
}

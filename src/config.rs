//! Benchmark configuration.
//!
//! Every knob that used to be a hard-coded constant of a benchmark run
//! lives in [`BenchConfig`]: the matrix sizes, worker count, RNG seed,
//! iteration counts, the value range of the random inputs and which
//! executor drives the parallel kernels. A config can be built in code,
//! taken from [`Default`], or read from `GEMMLY_*` environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{validation_error, GemmlyError, Result};
use crate::parallel::available_workers;

/// Which executor runs the parallel kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutorKind {
    /// Fresh OS threads per call; thread launch is part of the timing.
    #[default]
    Scoped,
    /// A persistent rayon pool built once per configuration.
    Pooled,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Scoped => f.write_str("scoped"),
            ExecutorKind::Pooled => f.write_str("pooled"),
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = GemmlyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoped" => Ok(ExecutorKind::Scoped),
            "pooled" => Ok(ExecutorKind::Pooled),
            other => Err(validation_error(format!(
                "unknown executor '{other}', expected 'scoped' or 'pooled'"
            ))),
        }
    }
}

/// Parameters of one benchmark session.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Matrix dimensions to benchmark.
    pub sizes: Vec<usize>,
    /// Worker count; `None` uses the detected hardware concurrency.
    pub threads: Option<usize>,
    /// Seed of the RNG filling A and B.
    pub seed: u64,
    /// Timed iterations per variant and size.
    pub iterations: usize,
    /// Untimed iterations run before timing starts.
    pub warmup: usize,
    /// Inputs are drawn uniformly from `[low, high)`.
    pub value_range: (f64, f64),
    pub executor: ExecutorKind,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sizes: vec![384, 768, 1152],
            threads: None,
            seed: 42,
            iterations: 5,
            warmup: 1,
            value_range: (-10.0, 10.0),
            executor: ExecutorKind::Scoped,
        }
    }
}

impl BenchConfig {
    /// Defaults overridden by any `GEMMLY_*` variable that is set.
    ///
    /// | variable             | field        | format                  |
    /// |----------------------|--------------|-------------------------|
    /// | `GEMMLY_SIZES`       | `sizes`      | comma-separated, `384,768` |
    /// | `GEMMLY_THREADS`     | `threads`    | positive integer        |
    /// | `GEMMLY_SEED`        | `seed`       | integer                 |
    /// | `GEMMLY_ITERATIONS`  | `iterations` | positive integer        |
    /// | `GEMMLY_WARMUP`      | `warmup`     | integer                 |
    /// | `GEMMLY_EXECUTOR`    | `executor`   | `scoped` or `pooled`    |
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the variable that failed to parse,
    /// or any error from [`validate`](BenchConfig::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// [`from_env`](BenchConfig::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GEMMLY_SIZES") {
            config.sizes = parse_sizes(&raw).map_err(|e| with_key("GEMMLY_SIZES", e))?;
        }
        if let Some(raw) = lookup("GEMMLY_THREADS") {
            config.threads = Some(parse_number("GEMMLY_THREADS", &raw)?);
        }
        if let Some(raw) = lookup("GEMMLY_SEED") {
            config.seed = parse_number("GEMMLY_SEED", &raw)?;
        }
        if let Some(raw) = lookup("GEMMLY_ITERATIONS") {
            config.iterations = parse_number("GEMMLY_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("GEMMLY_WARMUP") {
            config.warmup = parse_number("GEMMLY_WARMUP", &raw)?;
        }
        if let Some(raw) = lookup("GEMMLY_EXECUTOR") {
            config.executor = raw.parse().map_err(|e| with_key("GEMMLY_EXECUTOR", e))?;
        }

        config.validate()?;
        debug!("benchmark config: {config:?}");
        Ok(config)
    }

    /// Checks that the configuration describes a runnable session.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no size is given, a size is zero,
    /// `threads` or `iterations` is zero, or the value range is empty or
    /// not finite.
    pub fn validate(&self) -> Result<()> {
        if self.sizes.is_empty() {
            return Err(validation_error("at least one matrix size is required"));
        }
        if self.sizes.contains(&0) {
            return Err(validation_error("matrix sizes must be positive"));
        }
        if self.threads == Some(0) {
            return Err(validation_error("thread count must be positive"));
        }
        if self.iterations == 0 {
            return Err(validation_error("at least one timed iteration is required"));
        }
        let (low, high) = self.value_range;
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(validation_error(format!("empty value range [{low}, {high})")));
        }
        Ok(())
    }

    /// The number of workers parallel kernels run with.
    pub fn worker_count(&self) -> usize {
        self.threads.unwrap_or_else(available_workers)
    }
}

/// Parses a comma-separated list of matrix sizes.
///
/// # Errors
///
/// Returns a validation error if an entry is not a positive integer.
pub fn parse_sizes(list: &str) -> Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(validation_error(format!("invalid matrix size '{s}'"))),
        })
        .collect()
}

fn parse_number<N: FromStr>(key: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| validation_error(format!("{key}: '{raw}' is not a valid number")))
}

fn with_key(key: &str, err: GemmlyError) -> GemmlyError {
    validation_error(format!("{key}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sizes, vec![384, 768, 1152]);
        assert_eq!(config.seed, 42);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = BenchConfig::from_lookup(lookup_from(&[
            ("GEMMLY_SIZES", "64, 128"),
            ("GEMMLY_THREADS", "3"),
            ("GEMMLY_SEED", "7"),
            ("GEMMLY_EXECUTOR", "Pooled"),
        ]))
        .unwrap();

        assert_eq!(config.sizes, vec![64, 128]);
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.seed, 7);
        assert_eq!(config.executor, ExecutorKind::Pooled);
        assert_eq!(config.iterations, 5);
    }

    #[test]
    fn test_from_lookup_reports_variable() {
        let err = BenchConfig::from_lookup(lookup_from(&[("GEMMLY_THREADS", "many")])).unwrap_err();
        assert!(err.to_string().contains("GEMMLY_THREADS"));

        let err = BenchConfig::from_lookup(lookup_from(&[("GEMMLY_SIZES", "64,x")])).unwrap_err();
        assert!(err.to_string().contains("GEMMLY_SIZES"));

        let err = BenchConfig::from_lookup(lookup_from(&[("GEMMLY_THREADS", "0")])).unwrap_err();
        assert!(err.to_string().contains("thread count"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BenchConfig::default();
        config.sizes.clear();
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.iterations = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.value_range = (1.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_executor_kind_parse() {
        assert_eq!("scoped".parse::<ExecutorKind>().unwrap(), ExecutorKind::Scoped);
        assert!("threads".parse::<ExecutorKind>().is_err());
        assert_eq!(ExecutorKind::Pooled.to_string(), "pooled");
    }
}

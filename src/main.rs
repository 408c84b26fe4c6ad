//! `gemmly` command-line benchmark runner.
//!
//! ```text
//! gemmly [OPTIONS] [VARIANT[,VARIANT...]|all] [N...]
//! ```
//!
//! Defaults come from `BenchConfig::from_env`, so `GEMMLY_*` variables apply
//! unless overridden on the command line.

use std::env;
use std::process;

use gemmly::config::parse_sizes;
use gemmly::error::validation_error;
use gemmly::partition::idle_workers;
use gemmly::variant::parse_variants;
use gemmly::{
    measure, BenchConfig, Element, Executor, ExecutorKind, PooledExecutor, Result, ScopedExecutor,
    Variant, Workload, TILE,
};

const USAGE: &str = "\
usage: gemmly [OPTIONS] [VARIANT[,VARIANT...]|all] [N...]

options:
  --f32 | --f64        element type (default f64)
  --scoped | --pooled  thread launch per call, or a persistent pool
  --threads N          worker count (default: hardware threads)
  --iterations N       timed iterations per variant
  --warmup N           untimed iterations per variant
  --seed N             RNG seed for A and B
  --verify             compare every result with the naive kernel
  --list               print the variant names and exit
  -h, --help           print this message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    F32,
    F64,
}

#[derive(Debug)]
struct Options {
    config: BenchConfig,
    variants: Vec<Variant>,
    precision: Precision,
    verify: bool,
}

enum Command {
    Run(Options),
    Help,
    List,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut config = BenchConfig::from_env()?;
    let mut variants = None;
    let mut sizes = Vec::new();
    let mut precision = Precision::F64;
    let mut verify = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--list" => return Ok(Command::List),
            "--f32" => precision = Precision::F32,
            "--f64" => precision = Precision::F64,
            "--scoped" => config.executor = ExecutorKind::Scoped,
            "--pooled" => config.executor = ExecutorKind::Pooled,
            "--verify" => verify = true,
            "--threads" => config.threads = Some(value_of(&arg, args.next())?),
            "--iterations" => config.iterations = value_of(&arg, args.next())?,
            "--warmup" => config.warmup = value_of(&arg, args.next())?,
            "--seed" => config.seed = value_of(&arg, args.next())?,
            flag if flag.starts_with('-') => {
                return Err(validation_error(format!("unknown option '{flag}'")));
            }
            word if word.starts_with(|c: char| c.is_ascii_digit()) => {
                sizes.extend(parse_sizes(word)?);
            }
            word => {
                if variants.is_some() {
                    return Err(validation_error(format!("variants given twice, at '{word}'")));
                }
                variants = Some(parse_variants(word)?);
            }
        }
    }

    if !sizes.is_empty() {
        config.sizes = sizes;
    }
    config.validate()?;

    Ok(Command::Run(Options {
        config,
        variants: variants.unwrap_or_else(|| Variant::ALL.to_vec()),
        precision,
        verify,
    }))
}

fn value_of<N: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<N> {
    let value = value.ok_or_else(|| validation_error(format!("{flag} needs a value")))?;
    value
        .parse()
        .map_err(|_| validation_error(format!("{flag}: '{value}' is not a valid number")))
}

fn run_with_executor(options: &Options) -> Result<()> {
    let workers = options.config.worker_count();
    match options.config.executor {
        ExecutorKind::Scoped => run_precision(options, &ScopedExecutor::new(workers)?),
        ExecutorKind::Pooled => run_precision(options, &PooledExecutor::new(workers)?),
    }
}

fn run_precision<E: Executor>(options: &Options, exec: &E) -> Result<()> {
    match options.precision {
        Precision::F32 => run_session::<f32, E>(options, exec),
        Precision::F64 => run_session::<f64, E>(options, exec),
    }
}

fn run_session<T: Element, E: Executor>(options: &Options, exec: &E) -> Result<()> {
    let config = &options.config;
    println!(
        "\n🔢 GEMM BENCHMARK ({}, {} executor, {} workers)\n{}",
        T::NAME,
        config.executor,
        exec.workers(),
        "=".repeat(72)
    );
    println!(
        "seed {} | {} warmup + {} timed iterations | values in [{}, {})",
        config.seed, config.warmup, config.iterations, config.value_range.0, config.value_range.1
    );

    let mut failures = 0;
    for &n in &config.sizes {
        let mut workload = Workload::<T>::random(n, config.seed, config.value_range)?;

        println!("\n📊 N = {n}");
        if let Some(note) = idle_note(n, exec.workers(), &options.variants) {
            println!("⚠️  {note}");
        }
        println!("{}", "-".repeat(72));
        let check_header = if options.verify { "check" } else { "" };
        println!(
            "{:<30} {:>10} {:>10} {:>10} {:>9}  {}",
            "variant", "mean ms", "min ms", "max ms", "GFLOP/s", check_header
        );

        for &variant in &options.variants {
            if variant.requires_tiles() && n % TILE != 0 {
                println!("{:<30} skipped: N is not a multiple of {TILE}", variant.name());
                continue;
            }

            let m = measure(&mut workload, variant, exec, config.warmup, config.iterations)?;
            let check = if options.verify {
                let v = workload.verify(variant, exec)?;
                if v.passed() {
                    format!("ok ({:.1e})", v.max_error)
                } else {
                    failures += 1;
                    format!("FAILED ({:.1e} > {:.0e})", v.max_error, v.tolerance)
                }
            } else {
                String::new()
            };

            println!(
                "{:<30} {:>10.3} {:>10.3} {:>10.3} {:>9.2}  {}",
                variant.name(),
                m.mean_ms(),
                m.min_ms(),
                m.max_ms(),
                m.gflops(),
                check
            );
        }
    }

    if failures > 0 {
        return Err(validation_error(format!("{failures} variant(s) failed verification")));
    }
    Ok(())
}

/// Warns when some workers get no rows or column chunks at size `n`.
///
/// The library reports this through `log::warn!`, which the binary has no
/// backend to display.
fn idle_note(n: usize, workers: usize, variants: &[Variant]) -> Option<String> {
    if !variants.iter().any(|v| v.is_parallel()) {
        return None;
    }
    let chunks = n.div_ceil(TILE);
    let idle_chunks = idle_workers(chunks, workers);
    if idle_chunks == 0 {
        return None;
    }
    let mut note = format!(
        "{workers} workers but only {chunks} column chunks: \
         {idle_chunks} workers idle in column-partitioned variants"
    );
    let idle_rows = idle_workers(n, workers);
    if idle_rows > 0 {
        note.push_str(&format!(", {idle_rows} idle in row-partitioned variants"));
    }
    Some(note)
}

fn main() {
    let result = parse_args(env::args().skip(1)).and_then(|command| match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::List => {
            for variant in Variant::ALL {
                println!("{variant}");
            }
            Ok(())
        }
        Command::Run(options) => run_with_executor(&options),
    });

    if let Err(e) = result {
        eprintln!("gemmly: {e}");
        process::exit(1);
    }
}

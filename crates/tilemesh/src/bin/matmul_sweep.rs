use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tilemesh::{
    ComputeGrid, DataType,
    matmul::{
        components::Strategy,
        driver::{BenchContext, ExecutionMode, Iterations},
        report::CsvReport,
        sweep::{CaseFilter, enumerate_cases, run_sweep},
    },
    runtime::config::GlobalConfig,
};

/// Benchmark tiled matmuls over the configured sweep and write a CSV report.
///
/// Settings come from `tilemesh.toml` (or `--config`), then the `TILEMESH_*` environment
/// variables, then the flags below.
#[derive(Parser, Debug)]
#[command(name = "matmul_sweep")]
struct Cli {
    /// Configuration file, instead of searching the current directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path of the CSV report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Untimed iterations per case
    #[arg(long)]
    warmup: Option<u32>,

    /// Timed iterations per case
    #[arg(long)]
    iterations: Option<u32>,

    /// Cores used by each matmul, as `XxY`
    #[arg(long, value_parser = parse_grid)]
    grid: Option<ComputeGrid>,

    /// Only run traced cases
    #[arg(long, conflicts_with = "direct_only")]
    trace_only: bool,

    /// Only run direct cases
    #[arg(long)]
    direct_only: bool,

    /// Only run one data type (bfloat16, bfloat8_b, bfloat4_b)
    #[arg(long)]
    dtype: Option<DataType>,

    /// Only run one strategy (NonOptimized, Reuse, ReuseMultiCast, Cannon)
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Skip shapes with a dimension above this
    #[arg(long)]
    max_dim: Option<u32>,
}

fn parse_grid(value: &str) -> Result<ComputeGrid, String> {
    let (x, y) = value
        .split_once(['x', ','])
        .ok_or_else(|| format!("expected `XxY`, got `{value}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid grid extent `{v}`: {err}"))
    };

    Ok(ComputeGrid::new(parse(x)?, parse(y)?))
}

fn load_config(cli: &Cli) -> Result<GlobalConfig> {
    let mut config = match &cli.config {
        Some(path) => GlobalConfig::from_file_path(path)
            .with_context(|| format!("loading {}", path.display()))?
            .override_from_env(),
        None => GlobalConfig::get().as_ref().clone(),
    };

    let benchmark = &mut config.benchmark;
    if let Some(report) = &cli.report {
        benchmark.report = report.clone();
    }
    if let Some(warmup) = cli.warmup {
        benchmark.num_warmup_iterations = warmup;
    }
    if let Some(iterations) = cli.iterations {
        benchmark.num_measurement_iterations = iterations;
    }
    if let Some(grid) = cli.grid {
        benchmark.grid = grid;
    }

    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Arc::new(load_config(&cli)?);
    let filter = CaseFilter {
        dtype: cli.dtype,
        strategy: cli.strategy.map(|strategy| strategy.to_string()),
        mode: match (cli.trace_only, cli.direct_only) {
            (true, _) => Some(ExecutionMode::Traced),
            (_, true) => Some(ExecutionMode::Direct),
            _ => None,
        },
        max_dim: cli.max_dim,
    };

    let cases = enumerate_cases(&config, &filter);
    if cases.is_empty() {
        bail!("No benchmark case matches the configuration and filters");
    }
    log::info!("Running {} cases", cases.len());

    let benchmark = &config.benchmark;
    let iterations = Iterations::new(
        benchmark.num_warmup_iterations,
        benchmark.num_measurement_iterations,
    )?;
    let mut report = CsvReport::create(&benchmark.report)
        .with_context(|| format!("creating {}", benchmark.report.display()))?;

    let mut context = BenchContext::host(config.clone());
    let summary = run_sweep(&mut context, &cases, iterations, &mut report)?;
    let profiled = context.close();

    if !profiled.is_empty() {
        println!("{profiled}");
    }
    for failure in summary.failures.iter() {
        eprintln!("{}: {}", failure.id, failure.error);
    }
    println!(
        "{} cases benchmarked, {} failed, report written to {}",
        summary.samples.len(),
        summary.failures.len(),
        benchmark.report.display()
    );

    Ok(())
}

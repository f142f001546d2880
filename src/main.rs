//! threaded-memcpy CLI - benchmark and inspect the block-parallel copy pool

use clap::Parser;
use std::time::Instant;
use threaded_memcpy::benchmark::{print_results, run_benchmark, run_single_copy};
use threaded_memcpy::config::{parse_size, CliArgs, Commands, OutputFormat, PoolConfig};
use threaded_memcpy::core::{BlockPlan, CopyPool};
use threaded_memcpy::error::{MemcpyError, Result};
use threaded_memcpy::VERSION;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: CliArgs) -> Result<()> {
    let config = PoolConfig::from_cli(&args)?;

    match &args.command {
        Commands::Benchmark { size, iterations } => cmd_benchmark(&config, size, *iterations, args.output_format),
        Commands::Copy { size } => cmd_copy(&config, size, args.output_format),
        Commands::Plan { size } => cmd_plan(&config, size, args.output_format),
        Commands::Config => cmd_config(&config, args.output_format),
    }
}

fn parse_copy_size(size: &str) -> Result<usize> {
    let bytes = parse_size(size).map_err(|e| MemcpyError::config(format!("Invalid copy size: {}", e)))?;
    usize::try_from(bytes).map_err(|_| MemcpyError::config(format!("Copy size {} does not fit in memory", size)))
}

fn cmd_benchmark(config: &PoolConfig, size: &str, iterations: usize, format: OutputFormat) -> Result<()> {
    let size_bytes = parse_copy_size(size)?;
    if iterations == 0 {
        return Err(MemcpyError::config("at least one iteration is required"));
    }

    let pool = CopyPool::new(*config)?;

    if format == OutputFormat::Text {
        println!("=== threaded-memcpy {} Benchmark ===", VERSION);
        println!("Buffer size: {}", humansize::format_size(size_bytes as u64, humansize::BINARY));
        println!("Workers:     {}", pool.thread_count());
        println!("Block size:  {}", humansize::format_size(config.block_size as u64, humansize::BINARY));
        println!("Blocks:      {}", pool.plan(size_bytes).blocks);
        println!("Iterations:  {}\n", iterations);
    }

    let results = run_benchmark(&pool, size_bytes, iterations)?;
    pool.shutdown()?;

    match format {
        OutputFormat::Text => print_results(&results),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    Ok(())
}

fn cmd_copy(config: &PoolConfig, size: &str, format: OutputFormat) -> Result<()> {
    let size_bytes = parse_copy_size(size)?;

    let started = Instant::now();
    let pool = CopyPool::new(*config)?;
    let report = run_single_copy(&pool, size_bytes)
        .map_err(|e| e.with_context(format!("copy of {} bytes", size_bytes)))?;

    let stats = pool.stats();
    let pool_throughput = stats.throughput(started.elapsed());
    let snapshot = stats.snapshot();
    pool.shutdown()?;

    match format {
        OutputFormat::Text => {
            println!("=== threaded-memcpy {} Copy ===", VERSION);
            println!("Workers:      {}", config.effective_threads());
            report.print_summary();
            println!(
                "Pool total:   {} chunks, {}/s including startup",
                snapshot.chunks_copied,
                humansize::format_size(pool_throughput as u64, humansize::BINARY)
            );
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "version": VERSION,
                "report": report,
                "stats": snapshot,
                "pool_throughput": pool_throughput,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn cmd_plan(config: &PoolConfig, size: &str, format: OutputFormat) -> Result<()> {
    let size_bytes = parse_copy_size(size)?;
    let plan = BlockPlan::compute(size_bytes, config.block_size, config.effective_threads());
    let spans = plan.chunk_spans();

    match format {
        OutputFormat::Text => {
            println!("=== Block Plan ===");
            println!("Size:      {} bytes", plan.size);
            println!("Workers:   {}", config.effective_threads());
            println!("Blocks:    {}", plan.blocks);
            println!("Chunk:     {} bytes", plan.chunk_size);
            println!("Remainder: {} bytes (first chunk)", plan.remainder);
            println!();
            for (index, (offset, len)) in spans.iter().enumerate() {
                println!("  chunk {:>2}: offset {:>12}  len {:>12}", index, offset, len);
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "plan": plan,
                "chunks": spans,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn cmd_config(config: &PoolConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("=== Configuration ===");
            println!("Threads:     {}", config.effective_threads());
            println!("Thread cap:  {}", config.max_threads);
            println!("Block size:  {}", humansize::format_size(config.block_size as u64, humansize::BINARY));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use fastq_sort::utils::{self, format_bytes, format_duration, throughput};
use fastq_sort::{ExternalSortConfig, ExternalSortProcessor};

#[derive(Parser)]
#[command(name = "fastq-sort")]
#[command(about = "Sort a FASTQ file by read sequence, using disk for files larger than memory")]
#[command(version)]
struct Args {
    #[arg(value_name = "INPUT", help = "Input FASTQ file (plain or compressed)")]
    input: PathBuf,

    #[arg(short, long, help = "Output FASTQ file; a .gz name is gzip-compressed")]
    output: PathBuf,

    #[arg(short = 't', long, help = "Directory for intermediate chunk files (default: beside the output)")]
    temp_dir: Option<PathBuf>,

    #[arg(short, long, help = "JSON configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => ExternalSortConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExternalSortConfig::default(),
    };

    if let Some(temp_dir) = args.temp_dir {
        config.temp_directory = Some(temp_dir);
    }

    let start_time = Instant::now();
    let processor = ExternalSortProcessor::new(config)?;

    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());
    info!("Records per chunk: {}", processor.config().max_records);
    if let Some(dir) = &processor.config().temp_directory {
        info!("Chunk directory: {}", dir.display());
    }
    let (input, output) = (args.input, args.output);

    let stats = tokio::task::spawn_blocking(move || processor.process(&input, &output))
        .await
        .context("Sort task panicked")?
        .context("Sort failed")?;

    let elapsed = start_time.elapsed().as_secs_f64();
    info!("Records sorted: {}", stats.total_records);
    info!("Chunks created: {}", stats.chunks_created);
    if stats.intermediate_passes > 0 {
        info!(
            "Intermediate merge passes: {} ({} extra chunks)",
            stats.intermediate_passes, stats.intermediate_chunks
        );
    }
    info!("Chunk disk usage: {}", format_bytes(stats.chunk_bytes));
    info!("Total time: {}", format_duration(elapsed));
    info!("Throughput: {:.0} records/sec", throughput(stats.total_records, elapsed));

    Ok(())
}

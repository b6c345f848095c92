mod chunk;
mod extract;
mod fetch;
mod pipeline;
mod record;
mod sheet;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use fetch::{Fetcher, HttpFetcher, Retry};
use sheet::Sink;

#[derive(Parser)]
#[command(name = "linkmeta", about = "Media URL metadata scraper with chunked resume")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FetchArgs {
    /// Delay between records (ms), to stay polite with target sites
    #[arg(long, default_value_t = pipeline::DEFAULT_DELAY_MS)]
    delay_ms: u64,
    /// Fetch attempts before giving up on a URL
    #[arg(long, default_value_t = fetch::DEFAULT_ATTEMPTS)]
    attempts: u32,
    /// Fixed backoff between fetch attempts (ms)
    #[arg(long, default_value_t = fetch::DEFAULT_BACKOFF_MS)]
    backoff_ms: u64,
    /// Page-load timeout per attempt (seconds)
    #[arg(long, default_value_t = fetch::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl FetchArgs {
    fn fetcher(&self) -> Result<HttpFetcher> {
        HttpFetcher::new(
            Duration::from_secs(self.timeout_secs),
            Retry {
                attempts: self.attempts,
                backoff: Duration::from_millis(self.backoff_ms),
            },
        )
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Args, Clone)]
struct PoolArgs {
    /// Worker pool size for chunk processing
    #[arg(short, long, default_value_t = pipeline::DEFAULT_WORKERS)]
    workers: usize,
    /// Process chunks strictly one at a time
    #[arg(long)]
    sequential: bool,
}

impl PoolArgs {
    fn workers(&self) -> usize {
        if self.sequential {
            1
        } else {
            self.workers.max(1)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split the input CSV into numbered chunk files
    Split {
        input: PathBuf,
        #[arg(long, default_value = "chunks")]
        chunk_dir: PathBuf,
        #[arg(short = 'c', long, default_value_t = 100)]
        chunk_size: usize,
    },
    /// Process pending chunks (already-processed chunks are skipped)
    Process {
        #[arg(long, default_value = "chunks")]
        chunk_dir: PathBuf,
        #[arg(long, default_value = "processed_chunks")]
        processed_dir: PathBuf,
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Combine processed chunks into the final output CSV
    Combine {
        output: PathBuf,
        #[arg(long, default_value = "processed_chunks")]
        processed_dir: PathBuf,
    },
    /// Split + process + combine in one pipeline
    Run {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "chunks")]
        chunk_dir: PathBuf,
        #[arg(long, default_value = "processed_chunks")]
        processed_dir: PathBuf,
        #[arg(short = 'c', long, default_value_t = 100)]
        chunk_size: usize,
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Append records to a Google Sheet, resuming from its current row count
    Sheet {
        input: PathBuf,
        /// Spreadsheet ID (the long token in the sheet URL)
        #[arg(long)]
        spreadsheet_id: String,
        #[arg(long, default_value = "Scraped Data")]
        sheet_name: String,
        /// Clear the sheet and start from the first record
        #[arg(long)]
        reset: bool,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Show chunk pipeline progress
    Status {
        #[arg(long, default_value = "chunks")]
        chunk_dir: PathBuf,
        #[arg(long, default_value = "processed_chunks")]
        processed_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Split {
            input,
            chunk_dir,
            chunk_size,
        } => {
            require_input(&input)?;
            let paths = chunk::split_csv(&input, &chunk_dir, chunk_size)?;
            println!("Created {} chunks in {}", paths.len(), chunk_dir.display());
            Ok(())
        }
        Commands::Process {
            chunk_dir,
            processed_dir,
            pool,
            fetch,
        } => {
            let stats = process_chunks(&chunk_dir, &processed_dir, &pool, &fetch).await?;
            print_pipeline_stats(&stats);
            Ok(())
        }
        Commands::Combine {
            output,
            processed_dir,
        } => {
            let total = chunk::combine(&processed_dir, &output)?;
            println!("Wrote {} rows to {}", total, output.display());
            Ok(())
        }
        Commands::Run {
            input,
            output,
            chunk_dir,
            processed_dir,
            chunk_size,
            pool,
            fetch,
        } => {
            require_input(&input)?;

            let paths = chunk::split_csv(&input, &chunk_dir, chunk_size)?;
            println!("Step 1: split into {} chunks", paths.len());

            let stats = process_chunks(&chunk_dir, &processed_dir, &pool, &fetch).await?;
            println!("Step 2: processed chunks");
            print_pipeline_stats(&stats);

            let total = chunk::combine(&processed_dir, &output)?;
            println!("Step 3: combined {} rows into {}", total, output.display());
            Ok(())
        }
        Commands::Sheet {
            input,
            spreadsheet_id,
            sheet_name,
            reset,
            fetch,
        } => {
            require_input(&input)?;
            let sink = sheet::GoogleSheet::from_env(&spreadsheet_id, &sheet_name)?;
            if reset {
                sink.clear().await?;
                println!("Sheet cleared, starting fresh");
            }

            let records = chunk::read_records(&input)?;
            let fetcher = fetch.fetcher()?;
            let registry = extract::Registry::builtin();
            let stats = sheet::run(&fetcher, &registry, &sink, records, fetch.delay()).await?;

            if stats.attempted == 0 {
                println!(
                    "All {} records already in the sheet, nothing to do",
                    stats.total
                );
            } else {
                println!(
                    "Done: {}/{} rows written ({} were already in the sheet)",
                    stats.written, stats.attempted, stats.already_done
                );
            }
            Ok(())
        }
        Commands::Status {
            chunk_dir,
            processed_dir,
        } => {
            let chunks = chunk::list_chunks(&chunk_dir)?;
            let processed = chunk::list_processed(&processed_dir)?;
            println!("Chunks:    {}", chunks.len());
            println!("Processed: {}", processed.len());
            println!(
                "Pending:   {}",
                chunks.len().saturating_sub(processed.len())
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn require_input(input: &std::path::Path) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    Ok(())
}

async fn process_chunks(
    chunk_dir: &std::path::Path,
    processed_dir: &std::path::Path,
    pool: &PoolArgs,
    fetch_args: &FetchArgs,
) -> Result<pipeline::PipelineStats> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetch_args.fetcher()?);
    let registry = Arc::new(extract::Registry::builtin());
    let opts = pipeline::PipelineOptions {
        workers: pool.workers(),
        delay: fetch_args.delay(),
    };
    pipeline::run(fetcher, registry, chunk_dir, processed_dir, opts).await
}

fn print_pipeline_stats(stats: &pipeline::PipelineStats) {
    println!(
        "{} chunks ({} skipped), {} records, {} fetch errors",
        stats.chunks, stats.skipped, stats.records, stats.fetch_errors
    );
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

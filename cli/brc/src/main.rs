use anyhow::{Context, Result};
use brc::{ChunkPolicy, EofPolicy, MeanMode, Pipeline, Settings, Strategy};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Per-station min/mean/max over a `KEY;VALUE` measurements file.
#[derive(Parser, Debug)]
struct Args {
    /// Input file (defaults to measurements.txt or BRC_INPUT)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Where the raw chunk is written when a record fails to parse
    #[arg(long)]
    dump_path: Option<PathBuf>,
    /// Bytes per physical read
    #[arg(long)]
    chunk_bytes: Option<usize>,
    /// Parse workers (defaults to available cores)
    #[arg(long)]
    workers: Option<usize>,
    /// Partial tables allowed in flight between workers and the reducer
    #[arg(long)]
    queue_cap: Option<usize>,
    /// streaming | mmap
    #[arg(long)]
    strategy: Option<Strategy>,
    /// Fail when the input does not end with a newline
    #[arg(long)]
    strict_eof: bool,
    /// Keep only the last value of a key within each chunk
    #[arg(long)]
    last_value_wins: bool,
    /// Round the mean half away from zero instead of truncating
    #[arg(long)]
    round_mean: bool,
    /// Write run counters as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl Args {
    fn apply(&self, mut s: Settings) -> Settings {
        if let Some(v) = &self.input {
            s.input = v.clone();
        }
        if let Some(v) = &self.dump_path {
            s.dump_path = v.clone();
        }
        if let Some(v) = self.chunk_bytes {
            s.chunk_bytes = v;
        }
        if let Some(v) = self.workers {
            s.workers = v;
        }
        if let Some(v) = self.queue_cap {
            s.queue_cap = v;
        }
        if let Some(v) = self.strategy {
            s.strategy = v;
        }
        if self.strict_eof {
            s.eof = EofPolicy::Strict;
        }
        if self.last_value_wins {
            s.chunk_policy = ChunkPolicy::LastValueWins;
        }
        if self.round_mean {
            s.mean = MeanMode::HalfAwayFromZero;
        }
        s
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let settings = args.apply(Settings::from_env());
    let pipeline = Pipeline::new(settings);
    let input = pipeline.settings().input.clone();
    let summary = pipeline.run().with_context(|| format!("aggregating {}", input.display()))?;

    let rows = summary.rows(pipeline.settings());
    let stdout = std::io::stdout();
    brc::format::write_summary(stdout.lock(), &rows).context("write summary to stdout")?;

    if let Some(path) = &args.stats_json {
        let mut w = BufWriter::new(File::create(path).with_context(|| format!("create {}", path.display()))?);
        serde_json::to_writer_pretty(&mut w, &summary.run)?;
        w.flush()?;
    }
    Ok(())
}

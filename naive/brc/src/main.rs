use anyhow::{Context, Result};
use brc::format::{render, rows};
use brc::worker::parse_chunk;
use brc::Settings;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Single-threaded baseline: read everything, parse once, print.
#[derive(Parser, Debug)]
struct Args {
    /// Input file (defaults to measurements.txt or BRC_INPUT)
    #[arg(long)]
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").with_writer(std::io::stderr).init();
    let args = Args::parse();
    let settings = Settings::from_env();
    let input = args.input.unwrap_or(settings.input);
    let t0 = Instant::now();
    let bytes = fs::read(&input).with_context(|| format!("read {}", input.display()))?;
    let read_ms = t0.elapsed().as_millis() as u64;

    let table = parse_chunk(&bytes, 0, settings.chunk_policy)?;
    let line = render(&rows(&table.entries, settings.mean));
    info!(
        bytes = bytes.len(),
        records = table.records,
        keys = table.entries.len(),
        read_ms,
        total_ms = t0.elapsed().as_millis() as u64,
        "naive run complete"
    );
    println!("{}", line);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_flag_is_optional_path() {
        assert_eq!(Args::try_parse_from(["brc-naive"]).unwrap().input, None);
        let args = Args::try_parse_from(["brc-naive", "--input", "data/m.txt"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("data/m.txt")));
    }
}

use crate::chunk::{produce, split_aligned, Chunk, ChunkReader, EofPolicy};
use crate::config::{Settings, Strategy};
use crate::constants::{CHUNK_QUEUE_PER_WORKER, MMAP_SLICES_PER_WORKER};
use crate::error::{BrcError, Result};
use crate::format::{render, rows, OutputRow};
use crate::io::{map_input, open_input};
use crate::reduce::{GlobalStats, PartialTable, Reducer};
use crate::stats::RunStats;
use crate::worker::{parse_or_dump, WorkerPool, WorkerSettings};
use crossbeam_channel as channel;
use memchr::memrchr;
use rayon::prelude::*;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a complete run: the final table plus counters for the run.
#[derive(Debug)]
pub struct Summary {
    pub stats: GlobalStats,
    pub run: RunStats,
}

impl Summary {
    pub fn rows(&self, settings: &Settings) -> Vec<OutputRow> {
        rows(&self.stats, settings.mean)
    }

    pub fn render(&self, settings: &Settings) -> String {
        render(&self.rows(settings))
    }
}

pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings: settings.normalized() }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run over the configured input path.
    pub fn run(&self) -> Result<Summary> {
        self.run_path(&self.settings.input)
    }

    pub fn run_path(&self, path: impl AsRef<Path>) -> Result<Summary> {
        let path = path.as_ref();
        info!(
            input = %path.display(), strategy = %self.settings.strategy, workers = self.settings.workers,
            chunk_bytes = self.settings.chunk_bytes, queue_cap = self.settings.queue_cap,
            "brc starting"
        );
        match self.settings.strategy {
            Strategy::Streaming => self.run_reader(open_input(path)?),
            Strategy::Mmap => self.run_mapped(path),
        }
    }

    /// Streaming strategy over any reader: producer thread, worker pool, and the
    /// reducer on the calling thread.
    pub fn run_reader<R: Read + Send + 'static>(&self, reader: R) -> Result<Summary> {
        let s = &self.settings;
        let start = Instant::now();
        let (chunk_tx, chunk_rx) = channel::bounded::<Chunk>(s.workers * CHUNK_QUEUE_PER_WORKER);
        let (partial_tx, partial_rx) = channel::bounded::<Result<PartialTable>>(s.queue_cap);

        let chunks = ChunkReader::new(reader, s.chunk_bytes, s.eof);
        let producer = thread::Builder::new()
            .name("brc-producer".into())
            .spawn(move || produce(chunks, chunk_tx))
            .map_err(|e| BrcError::io("spawn producer thread", e))?;
        let pool = WorkerPool::spawn(s.workers, chunk_rx, partial_tx, Arc::new(self.worker_settings()))?;

        let reduced = Reducer::new().drain(partial_rx);
        let workers = pool.join();
        let produced = producer.join().map_err(|_| BrcError::Worker("producer thread panicked".into()))?;

        // a reducer error carries the root cause; producer errors next
        let (global, reduce_stats) = reduced?;
        let producer_stats = produced?;
        let worker_stats = workers?;

        let mut run = RunStats::new(Strategy::Streaming.as_str(), s.workers);
        run.record_producer(&producer_stats);
        run.record_workers(&worker_stats);
        run.record_reduce(&reduce_stats);
        run.wall_ms = start.elapsed().as_millis() as u64;
        for w in &worker_stats {
            debug!(worker = w.worker, chunks = w.chunks, records = w.records, parse_ms = w.parse_ms, send_wait_ms = w.send_wait_ms, "worker stats");
        }
        info!(
            phase = "streaming", chunks = run.chunks, bytes = run.bytes, records = run.records,
            partials = run.partials, keys = run.keys, produce_ms = producer_stats.wall_ms,
            merge_ms = reduce_stats.merge_ms, wall_ms = run.wall_ms,
            "Aggregation complete"
        );
        Ok(Summary { stats: global, run })
    }

    /// Mapped strategy: the same parser and reducer over newline-aligned slices
    /// of a memory-mapped file, parsed on a dedicated rayon pool.
    pub fn run_mapped(&self, path: &Path) -> Result<Summary> {
        let s = &self.settings;
        let start = Instant::now();
        let mut run = RunStats::new(Strategy::Mmap.as_str(), s.workers);
        let Some(map) = map_input(path)? else {
            info!(phase = "mmap", "input is empty");
            return Ok(Summary { stats: GlobalStats::new(), run });
        };
        let bytes = &map[..];
        if s.eof == EofPolicy::Strict && bytes.last() != Some(&b'\n') {
            let tail = bytes.len() - memrchr(b'\n', bytes).map(|i| i + 1).unwrap_or(0);
            return Err(BrcError::UnterminatedInput { bytes: tail });
        }

        let slices = split_aligned(bytes, s.workers * MMAP_SLICES_PER_WORKER);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(s.workers)
            .thread_name(|i| format!("brc-mmap-{}", i))
            .build()
            .map_err(|e| BrcError::Worker(e.to_string()))?;
        let ws = self.worker_settings();
        let parse_start = Instant::now();
        let partials: Vec<PartialTable> = pool.install(|| {
            slices
                .par_iter()
                .enumerate()
                .map(|(seq, slice)| parse_or_dump(slice, seq as u64, &ws))
                .collect::<Result<Vec<_>>>()
        })?;
        let parse_ms = parse_start.elapsed().as_millis() as u64;

        let mut reducer = Reducer::new();
        let mut records = 0u64;
        for p in partials {
            records += p.records;
            reducer.absorb(p);
        }
        let (global, reduce_stats) = reducer.finish();

        run.chunks = slices.len() as u64;
        run.bytes = bytes.len() as u64;
        run.records = records;
        run.record_reduce(&reduce_stats);
        run.wall_ms = start.elapsed().as_millis() as u64;
        info!(
            phase = "mmap", slices = run.chunks, bytes = run.bytes, records = run.records, keys = run.keys,
            parse_ms, merge_ms = reduce_stats.merge_ms, wall_ms = run.wall_ms,
            "Aggregation complete"
        );
        Ok(Summary { stats: global, run })
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings::new(self.settings.chunk_policy, self.settings.dump_path.clone())
    }
}

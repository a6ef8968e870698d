use crate::chunk::Chunk;
use crate::error::{BrcError, Result};
use crate::io::dump_chunk;
use crate::reduce::PartialTable;
use crate::stats::WorkerStats;
use crate::value::{parse_scaled, Stats};
use crossbeam_channel as channel;
use memchr::memchr;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How repeated keys inside one chunk are folded before the global merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Every occurrence counts.
    #[default]
    Aggregate,
    /// Only the last occurrence of a key in a chunk survives (count 1 per chunk).
    /// Matches the output of older runs that overwrote entries per chunk.
    LastValueWins,
}

#[derive(Debug)]
pub struct WorkerSettings {
    pub policy: ChunkPolicy,
    pub dump_path: PathBuf,
    // only the first failing chunk of a run is dumped
    dumped: AtomicBool,
}

impl WorkerSettings {
    pub fn new(policy: ChunkPolicy, dump_path: impl Into<PathBuf>) -> Self {
        Self { policy, dump_path: dump_path.into(), dumped: AtomicBool::new(false) }
    }
}

/// Parse every `KEY;VALUE` line of `bytes` into a partial table. Empty lines are
/// skipped; the last line may lack its terminator.
pub fn parse_chunk(bytes: &[u8], seq: u64, policy: ChunkPolicy) -> Result<PartialTable> {
    let mut entries: HashMap<String, Stats> = HashMap::new();
    let mut records = 0u64;
    let mut line_no = 0usize;
    let mut rest = bytes;
    while !rest.is_empty() {
        let (line, next) = match memchr(b'\n', rest) {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        rest = next;
        line_no += 1;
        if line.is_empty() {
            continue;
        }
        let semi = memchr(b';', line).ok_or_else(|| BrcError::malformed(line_no, line, "missing ';' delimiter"))?;
        let (key, raw) = (&line[..semi], &line[semi + 1..]);
        let value = parse_scaled(raw).map_err(|reason| BrcError::malformed(line_no, key, reason))?;
        let key = std::str::from_utf8(key).map_err(|_| BrcError::malformed(line_no, key, "key is not valid UTF-8"))?;
        records += 1;
        match entries.get_mut(key) {
            Some(s) => match policy {
                ChunkPolicy::Aggregate => s.add(value),
                ChunkPolicy::LastValueWins => *s = Stats::single(value),
            },
            None => {
                entries.insert(key.to_owned(), Stats::single(value));
            }
        }
    }
    Ok(PartialTable { seq, records, entries })
}

/// [`parse_chunk`], writing the raw chunk to the dump path when a record is
/// malformed. Later failures in the same run leave the first dump in place.
pub fn parse_or_dump(bytes: &[u8], seq: u64, settings: &WorkerSettings) -> Result<PartialTable> {
    parse_chunk(bytes, seq, settings.policy).map_err(|e| {
        error!(seq, "{}", e);
        if settings.dumped.swap(true, Ordering::AcqRel) {
            debug!(seq, "chunk dump already written by an earlier failure");
            return e;
        }
        match dump_chunk(&settings.dump_path, bytes) {
            Ok(()) => info!(path = %settings.dump_path.display(), bytes = bytes.len(), "wrote offending chunk"),
            Err(de) => error!(path = %settings.dump_path.display(), "chunk dump failed: {}", de),
        }
        e
    })
}

pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Start `n` workers pulling chunks from `chunks` and pushing one partial
    /// table per chunk into `partials`. A full `partials` queue blocks the worker.
    pub fn spawn(
        n: usize,
        chunks: channel::Receiver<Chunk>,
        partials: channel::Sender<Result<PartialTable>>,
        settings: Arc<WorkerSettings>,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(n);
        for worker in 0..n.max(1) {
            let rx = chunks.clone();
            let tx = partials.clone();
            let settings = Arc::clone(&settings);
            let handle = thread::Builder::new()
                .name(format!("brc-worker-{}", worker))
                .spawn(move || run_worker(worker, rx, tx, &settings))
                .map_err(|e| BrcError::io("spawn worker thread", e))?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    pub fn join(self) -> Result<Vec<WorkerStats>> {
        self.handles
            .into_iter()
            .map(|h| h.join().map_err(|_| BrcError::Worker("worker thread panicked".into())))
            .collect()
    }
}

fn run_worker(
    worker: usize,
    rx: channel::Receiver<Chunk>,
    tx: channel::Sender<Result<PartialTable>>,
    settings: &WorkerSettings,
) -> WorkerStats {
    let mut stats = WorkerStats { worker, ..WorkerStats::default() };
    let mut parse_time = Duration::ZERO;
    let mut send_wait = Duration::ZERO;
    for chunk in rx.iter() {
        let t0 = Instant::now();
        let parsed = parse_or_dump(&chunk.bytes, chunk.seq, settings);
        parse_time += t0.elapsed();
        let failed = parsed.is_err();
        if let Ok(p) = &parsed {
            stats.chunks += 1;
            stats.records += p.records;
        }
        let t1 = Instant::now();
        if tx.send(parsed).is_err() {
            debug!(worker, "partial receiver gone, worker stopping");
            break;
        }
        send_wait += t1.elapsed();
        if failed {
            break;
        }
    }
    stats.parse_ms = parse_time.as_millis() as u64;
    stats.send_wait_ms = send_wait.as_millis() as u64;
    debug!(worker, chunks = stats.chunks, records = stats.records, "worker done");
    stats
}

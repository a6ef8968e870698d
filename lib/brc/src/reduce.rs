use crate::error::Result;
use crate::stats::ReduceStats;
use crate::value::Stats;
use crossbeam_channel as channel;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Final per-key accumulator, written only by the [`Reducer`].
pub type GlobalStats = HashMap<String, Stats>;

/// Per-chunk result handed from a worker to the reducer exactly once.
#[derive(Debug, Default, Clone)]
pub struct PartialTable {
    pub seq: u64,
    pub records: u64,
    pub entries: HashMap<String, Stats>,
}

/// Single-writer merge of partial tables into [`GlobalStats`]. Arrival order
/// does not matter: [`Stats::merge`] is commutative and associative.
#[derive(Default)]
pub struct Reducer {
    global: GlobalStats,
    partials: u64,
    entries: u64,
    merge_time: Duration,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, partial: PartialTable) {
        let t0 = Instant::now();
        self.entries += partial.entries.len() as u64;
        for (key, stats) in partial.entries {
            match self.global.get_mut(&key) {
                Some(g) => g.merge(&stats),
                None => {
                    self.global.insert(key, stats);
                }
            }
        }
        self.partials += 1;
        self.merge_time += t0.elapsed();
    }

    /// Merge everything from `rx` until every sender is gone. The first error
    /// received ends the drain; dropping `rx` then unblocks and stops the senders.
    pub fn drain(mut self, rx: channel::Receiver<Result<PartialTable>>) -> Result<(GlobalStats, ReduceStats)> {
        let start = Instant::now();
        for msg in rx.iter() {
            match msg {
                Ok(partial) => {
                    debug!(seq = partial.seq, keys = partial.entries.len(), "merging partial table");
                    self.absorb(partial);
                }
                Err(e) => {
                    error!(partials = self.partials, "aborting reduce: {}", e);
                    return Err(e);
                }
            }
        }
        let (global, mut stats) = self.finish();
        stats.wall_ms = start.elapsed().as_millis() as u64;
        Ok((global, stats))
    }

    pub fn finish(self) -> (GlobalStats, ReduceStats) {
        let stats = ReduceStats {
            partials: self.partials,
            entries: self.entries,
            keys: self.global.len() as u64,
            merge_ms: self.merge_time.as_millis() as u64,
            wall_ms: 0,
        };
        (self.global, stats)
    }
}

use serde::Serialize;

#[derive(Default, Clone, Debug, Serialize)]
pub struct ProducerStats {
    pub chunks: u64,
    pub bytes: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct WorkerStats {
    pub worker: usize,
    pub chunks: u64,
    pub records: u64,
    pub parse_ms: u64,
    pub send_wait_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ReduceStats {
    pub partials: u64,
    pub entries: u64,
    pub keys: u64,
    pub merge_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct RunStats {
    pub strategy: String,
    pub workers: usize,
    pub chunks: u64,
    pub bytes: u64,
    pub records: u64,
    pub partials: u64,
    pub keys: u64,
    pub min_worker_records: u64,
    pub max_worker_records: u64,
    pub wall_ms: u64,
}

impl RunStats {
    pub fn new(strategy: &str, workers: usize) -> Self {
        Self { strategy: strategy.to_string(), workers, ..Self::default() }
    }

    pub fn record_producer(&mut self, p: &ProducerStats) {
        self.chunks = p.chunks;
        self.bytes = p.bytes;
    }

    pub fn record_workers(&mut self, per_worker: &[WorkerStats]) {
        if per_worker.is_empty() {
            return;
        }
        self.records = per_worker.iter().map(|w| w.records).sum();
        self.min_worker_records = per_worker.iter().map(|w| w.records).min().unwrap_or(0);
        self.max_worker_records = per_worker.iter().map(|w| w.records).max().unwrap_or(0);
    }

    pub fn record_reduce(&mut self, r: &ReduceStats) {
        self.partials = r.partials;
        self.keys = r.keys;
    }
}

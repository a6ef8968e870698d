//! End-to-end runs of both strategies over temporary input files.

use brc::reduce::PartialTable;
use brc::worker::parse_chunk;
use brc::{BrcError, ChunkPolicy, EofPolicy, GlobalStats, MeanMode, Pipeline, Reducer, Scaled, Settings, Stats, Strategy};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STATIONS: &[&str] = &["Abha", "Accra", "Bulawayo", "Hamburg", "Palembang", "St. John's", "Zürich", "İzmir"];

// Deterministic xorshift so the generated files are stable between runs.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn generate(records: usize, seed: u64) -> Vec<u8> {
    let mut rng = Rng(seed);
    let mut out = Vec::new();
    for _ in 0..records {
        let key = STATIONS[rng.below(STATIONS.len() as u64) as usize];
        let value = Scaled(rng.below(1999) as i64 - 999);
        out.extend_from_slice(format!("{};{}\n", key, value).as_bytes());
    }
    out
}

fn oracle(input: &[u8]) -> GlobalStats {
    let mut global = GlobalStats::new();
    for line in std::str::from_utf8(input).unwrap().lines().filter(|l| !l.is_empty()) {
        let (k, v) = line.split_once(';').unwrap();
        let v = Scaled(v.replace('.', "").parse().unwrap());
        global.entry(k.to_string()).and_modify(|s| s.add(v)).or_insert(Stats::single(v));
    }
    global
}

fn write_input(dir: &TempDir, contents: &[u8]) -> PathBuf {
    let path = dir.path().join("measurements.txt");
    fs::write(&path, contents).unwrap();
    path
}

fn settings(dir: &TempDir, strategy: Strategy, workers: usize, chunk_bytes: usize) -> Settings {
    Settings { strategy, workers, chunk_bytes, dump_path: dir.path().join("error.txt"), ..Settings::default() }
}

fn run(path: &Path, settings: Settings) -> Result<String, BrcError> {
    let pipeline = Pipeline::new(settings);
    let summary = pipeline.run_path(path)?;
    Ok(summary.render(pipeline.settings()))
}

#[test]
fn single_key_scenario() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"A;5.0\nA;10.0\nA;0.0\n");
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        assert_eq!(run(&path, settings(&dir, strategy, 2, 1024)).unwrap(), "{A=0.0/5.0/10.0}");
    }
}

#[test]
fn multi_key_output_is_sorted() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"B;1.0\nA;2.0\n");
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        assert_eq!(run(&path, settings(&dir, strategy, 3, 4)).unwrap(), "{A=2.0/2.0/2.0, B=1.0/1.0/1.0}");
    }
}

#[test]
fn malformed_value_dumps_chunk_and_fails() {
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        let dir = TempDir::new().unwrap();
        let path = write_input(&dir, b"A;abc\n");
        let err = run(&path, settings(&dir, strategy, 2, 1024)).unwrap_err();
        assert!(err.is_malformed(), "{:?}", err);
        assert_eq!(fs::read(dir.path().join("error.txt")).unwrap(), b"A;abc\n");
    }
}

#[test]
fn values_beyond_the_record_range_are_rejected_not_summed() {
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        let dir = TempDir::new().unwrap();
        let input = b"A;922337203685477580.0\nA;922337203685477580.0\n";
        let path = write_input(&dir, input);
        let err = run(&path, settings(&dir, strategy, 1, 1024)).unwrap_err();
        assert!(err.is_malformed(), "{:?}", err);
        assert!(err.to_string().contains("out of range"), "{}", err);
        // mmap may split the two records into separate slices
        let dump = fs::read(dir.path().join("error.txt")).unwrap();
        assert!(dump.starts_with(b"A;922337203685477580.0\n"), "{:?}", String::from_utf8_lossy(&dump));
    }
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"A;3276.7\nA;3276.7\nA;-3276.7\n");
    assert_eq!(run(&path, settings(&dir, Strategy::Streaming, 1, 1024)).unwrap(), "{A=-3276.7/1092.2/3276.7}");
}

#[test]
fn malformed_record_deep_in_a_large_file_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let mut input = generate(5_000, 7);
    input.extend_from_slice(b"Hamburg;12\n");
    input.extend_from_slice(&generate(5_000, 8));
    let path = write_input(&dir, &input);
    let err = run(&path, Settings { queue_cap: 1, ..settings(&dir, Strategy::Streaming, 4, 512) }).unwrap_err();
    assert!(err.is_malformed());
    let dump = fs::read(dir.path().join("error.txt")).unwrap();
    assert!(dump.windows(11).any(|w| w == b"Hamburg;12\n"));
    assert_eq!(dump.last(), Some(&b'\n'));
}

#[test]
fn missing_input_fails_with_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        let err = run(&path, settings(&dir, strategy, 1, 64)).unwrap_err();
        assert!(matches!(err, BrcError::Io { .. }));
        assert!(err.to_string().contains("absent.txt"));
    }
}

#[test]
fn result_is_independent_of_chunking_and_worker_count() {
    let dir = TempDir::new().unwrap();
    let input = generate(20_000, 42);
    let path = write_input(&dir, &input);
    let expected = oracle(&input);
    for workers in [1, 3, 8] {
        for chunk_bytes in [1, 17, 4096, 1 << 20] {
            for strategy in [Strategy::Streaming, Strategy::Mmap] {
                let summary = Pipeline::new(settings(&dir, strategy, workers, chunk_bytes)).run_path(&path).unwrap();
                assert_eq!(summary.stats, expected, "workers {} chunk {} {}", workers, chunk_bytes, strategy);
                assert_eq!(summary.run.records, 20_000);
            }
        }
    }
}

#[test]
fn merge_is_invariant_under_regrouping_and_reordering() {
    let input = generate(3_000, 99);
    let expected = oracle(&input);
    let lines: Vec<&[u8]> = input.split_inclusive(|&b| b == b'\n').collect();
    let mut rng = Rng(1234);
    for _ in 0..25 {
        // random partition into chunks
        let mut partials: Vec<PartialTable> = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let take = 1 + rng.below(200) as usize;
            let chunk: Vec<u8> = lines[i..(i + take).min(lines.len())].concat();
            partials.push(parse_chunk(&chunk, partials.len() as u64, ChunkPolicy::Aggregate).unwrap());
            i += take;
        }
        // random delivery order
        for j in (1..partials.len()).rev() {
            let k = rng.below(j as u64 + 1) as usize;
            partials.swap(j, k);
        }
        let mut reducer = Reducer::new();
        for p in partials {
            reducer.absorb(p);
        }
        assert_eq!(reducer.finish().0, expected);
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, &generate(10_000, 5));
    let first = run(&path, settings(&dir, Strategy::Streaming, 4, 333)).unwrap();
    let second = run(&path, settings(&dir, Strategy::Streaming, 4, 333)).unwrap();
    let mapped = run(&path, settings(&dir, Strategy::Mmap, 4, 333)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, mapped);
    assert!(first.starts_with("{Abha="));
}

#[test]
fn unterminated_last_record_follows_eof_policy() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"A;1.0\nB;2.0");
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        let flushed = run(&path, settings(&dir, strategy, 2, 4)).unwrap();
        assert_eq!(flushed, "{A=1.0/1.0/1.0, B=2.0/2.0/2.0}");
        let strict = run(&path, Settings { eof: EofPolicy::Strict, ..settings(&dir, strategy, 2, 4) }).unwrap_err();
        assert!(matches!(strict, BrcError::UnterminatedInput { bytes: 5 }), "{:?}", strict);
    }
}

#[test]
fn last_value_wins_drops_earlier_values_in_a_chunk() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"A;5.0\nA;10.0\nA;0.0\n");
    let lossy = Settings { chunk_policy: ChunkPolicy::LastValueWins, ..settings(&dir, Strategy::Streaming, 1, 1 << 20) };
    assert_eq!(run(&path, lossy.clone()).unwrap(), "{A=0.0/0.0/0.0}");
    // one record per chunk: nothing to overwrite
    assert_eq!(run(&path, Settings { chunk_bytes: 1, ..lossy }).unwrap(), "{A=0.0/5.0/10.0}");
}

#[test]
fn rounding_mean_is_opt_in() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"K;0.1\nK;0.1\nK;0.2\nN;-0.1\nN;-0.2\n");
    let truncated = run(&path, settings(&dir, Strategy::Streaming, 2, 64)).unwrap();
    assert_eq!(truncated, "{K=0.1/0.1/0.2, N=-0.2/-0.1/-0.1}");
    let rounded = run(&path, Settings { mean: MeanMode::HalfAwayFromZero, ..settings(&dir, Strategy::Streaming, 2, 64) }).unwrap();
    assert_eq!(rounded, "{K=0.1/0.1/0.2, N=-0.2/-0.2/-0.1}");
}

#[test]
fn empty_lines_are_skipped_and_empty_input_renders_braces() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, b"\n\nA;1.5\n\n");
    assert_eq!(run(&path, settings(&dir, Strategy::Streaming, 2, 3)).unwrap(), "{A=1.5/1.5/1.5}");
    let empty = write_input(&dir, b"");
    for strategy in [Strategy::Streaming, Strategy::Mmap] {
        assert_eq!(run(&empty, settings(&dir, strategy, 2, 3)).unwrap(), "{}");
    }
}

#[test]
fn run_reader_accepts_any_reader() {
    let input = generate(2_000, 11);
    let expected = oracle(&input);
    let pipeline = Pipeline::new(Settings { workers: 3, chunk_bytes: 100, queue_cap: 2, ..Settings::default() });
    let summary = pipeline.run_reader(Cursor::new(input)).unwrap();
    assert_eq!(summary.stats, expected);
    let counts: HashMap<&str, u64> = summary.stats.iter().map(|(k, s)| (k.as_str(), s.count)).collect();
    assert_eq!(counts.values().sum::<u64>(), 2_000);
    assert_eq!(summary.run.strategy, "streaming");
    assert!(summary.run.chunks > 1);
}
